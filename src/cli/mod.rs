// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use clap::Parser;
use std::path::PathBuf;

use crate::config::{ConfigError, ServerConfig};
use crate::vision::classifier::DevicePreference;

/// Fracture Detection API server
#[derive(Parser, Debug, Default)]
#[command(name = "fracture-detection-api")]
#[command(version)]
#[command(about = "Serve a DenseNet121 bone-fracture classifier with Grad-CAM overlays", long_about = None)]
pub struct Cli {
    /// TOML config file; CLI flags and env vars override its values
    #[arg(long, env = "FRACTURE_API_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on (e.g. 0.0.0.0:8000)
    #[arg(long, env = "FRACTURE_API_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "FRACTURE_API_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "FRACTURE_API_LOG_JSON")]
    pub log_json: bool,

    /// Maximum request body size in bytes
    #[arg(long, env = "FRACTURE_API_MAX_BODY_BYTES")]
    pub max_body_bytes: Option<usize>,

    /// Start even if the model cannot be loaded
    #[arg(long, env = "FRACTURE_API_ALLOW_MISSING_MODEL")]
    pub allow_missing_model: bool,

    /// ONNX backbone (DenseNet121 features)
    #[arg(long, env = "FRACTURE_API_BACKBONE_PATH")]
    pub backbone_path: Option<PathBuf>,

    /// JSON classifier head weights
    #[arg(long, env = "FRACTURE_API_HEAD_PATH")]
    pub head_path: Option<PathBuf>,

    /// Execution device
    #[arg(long, value_enum, env = "FRACTURE_API_DEVICE")]
    pub device: Option<DevicePreference>,

    /// Comma-separated class labels in model output order
    #[arg(long, value_delimiter = ',', env = "FRACTURE_API_CLASS_NAMES")]
    pub class_names: Option<Vec<String>>,

    /// Square model input size in pixels
    #[arg(long, env = "FRACTURE_API_INPUT_SIZE")]
    pub input_size: Option<u32>,

    /// ONNX Runtime intra-op threads
    #[arg(long, env = "FRACTURE_API_INTRA_THREADS")]
    pub intra_threads: Option<usize>,
}

impl Cli {
    /// Merge defaults, the optional config file and explicit flags
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        config.log_json |= self.log_json;
        if let Some(limit) = self.max_body_bytes {
            config.max_body_bytes = limit;
        }
        config.allow_missing_model |= self.allow_missing_model;

        if let Some(path) = self.backbone_path {
            config.model.backbone_path = path;
        }
        if let Some(path) = self.head_path {
            config.model.head_path = path;
        }
        if let Some(device) = self.device {
            config.model.device = device;
        }
        if let Some(names) = self.class_names {
            config.model.class_names = names.into_iter().map(|n| n.trim().to_string()).collect();
        }
        if let Some(size) = self.input_size {
            config.model.input_size = size;
        }
        if let Some(threads) = self.intra_threads {
            config.model.intra_threads = threads;
        }

        config.validate()?;
        Ok(config)
    }
}
