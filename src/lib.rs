// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod metrics;
pub mod version;
pub mod vision;

// Re-export main types
pub use api::{create_router, start_server, AppState};
pub use config::{ConfigError, ServerConfig};
pub use vision::{ClassifierConfig, FractureClassifier, ModelManager, Prediction};
