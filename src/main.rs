// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use fracture_detection_api::{
    api::{start_server, AppState},
    cli::Cli,
    config::ServerConfig,
    version,
    vision::ModelManager,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap reads FRACTURE_API_* variables
    dotenv::dotenv().ok();

    let config = Cli::parse().into_config()?;
    init_tracing(&config);

    info!("🚀 Starting {}", version::get_version_string());
    info!("📦 BUILD VERSION: {}", version::VERSION);

    let model_config = config.model.clone();
    info!(
        "🧠 Loading {} classifier from {} (device: {:?})",
        model_config.architecture,
        model_config.backbone_path.display(),
        model_config.device
    );

    let allow_missing = config.allow_missing_model;
    let manager = tokio::task::spawn_blocking(move || {
        if allow_missing {
            Ok(ModelManager::new(model_config))
        } else {
            ModelManager::load(model_config)
        }
    })
    .await??;

    if manager.is_loaded() {
        info!("✅ Model loaded successfully on {}", manager.device());
    } else {
        warn!("⚠️ Model not loaded; /analyze will return 503 until restarted with a valid model");
    }

    let state = AppState::new(manager)?;
    start_server(&config, state).await
}

/// RUST_LOG wins over the configured level
fn init_tracing(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}
