// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server configuration
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! CLI flags and `FRACTURE_API_*` environment variables (see `crate::cli`).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use crate::vision::ClassifierConfig;

/// Default request body limit: base64 inflates the 10 MiB image cap by 4/3
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid listen address '{0}'")]
    InvalidListenAddr(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Full service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_level: String,
    pub log_json: bool,
    pub max_body_bytes: usize,
    /// Keep serving `/health` and `/model-info` when the model fails to load
    pub allow_missing_model: bool,
    pub model: ClassifierConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            allow_missing_model: false,
            model: ClassifierConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(self.listen_addr.clone()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        if self.model.class_names.is_empty() {
            return Err(ConfigError::Invalid("class_names must not be empty".to_string()));
        }
        if self.model.class_names.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid("class_names must not contain blank labels".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self
            .model
            .class_names
            .iter()
            .find(|name| !seen.insert(name.trim()))
        {
            return Err(ConfigError::Invalid(format!(
                "class_names contains duplicate label '{}'",
                dup.trim()
            )));
        }
        if self.model.input_size == 0 {
            return Err(ConfigError::Invalid("input_size must be positive".to_string()));
        }
        if self.model.intra_threads == 0 {
            return Err(ConfigError::Invalid("intra_threads must be positive".to_string()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be positive".to_string()));
        }
        Ok(())
    }
}
