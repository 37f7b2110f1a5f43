// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! X-ray analysis endpoint module
//!
//! Provides POST /analyze: fracture classification with a Grad-CAM overlay.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::analyze_handler;
pub use request::AnalyzeRequest;
pub use response::AnalyzeResponse;
