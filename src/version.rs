// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Fracture Detection API

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-densenet121-gradcam-2025-10-18";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2025-10-18";

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Fracture Detection API {} ({})", VERSION_NUMBER, BUILD_DATE)
}
