// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod analyze;
pub mod errors;
pub mod handlers;
pub mod server;

pub use analyze::{analyze_handler, AnalyzeRequest, AnalyzeResponse};
pub use errors::{ApiError, ErrorResponse, TimedApiError};
pub use handlers::{HealthResponse, ModelInfoResponse};
pub use server::{create_router, start_server, AppState};
