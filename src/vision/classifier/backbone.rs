// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! DenseNet121 feature extractor running in ONNX Runtime

use anyhow::{Context, Result};
use ndarray::{Array4, Ix4};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Requested execution device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Try CUDA first, fall back to CPU
    #[default]
    Auto,
    /// CPU only
    Cpu,
    /// CUDA only; loading fails without a usable GPU
    Cuda,
}

/// Device the session actually runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionDevice {
    Cpu,
    Cuda,
}

impl fmt::Display for ExecutionDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionDevice::Cpu => write!(f, "cpu"),
            ExecutionDevice::Cuda => write!(f, "cuda"),
        }
    }
}

/// Produces the last convolutional feature map for a preprocessed image
///
/// Input is `[1, 3, S, S]`, output is `[1, C, H, W]` (DenseNet121 `features`,
/// i.e. after `norm5` and before the final ReLU).
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, input: &Array4<f32>) -> Result<Array4<f32>>;

    fn device(&self) -> ExecutionDevice;
}

/// ONNX Runtime backed feature extractor
#[derive(Clone)]
pub struct OnnxFeatureExtractor {
    /// ONNX Runtime session (`run` needs `&mut`)
    session: Arc<Mutex<Session>>,
    input_name: String,
    device: ExecutionDevice,
}

impl fmt::Debug for OnnxFeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxFeatureExtractor")
            .field("input_name", &self.input_name)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl OnnxFeatureExtractor {
    /// Load the backbone from an ONNX file
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - `DevicePreference::Cuda` was requested and CUDA is unavailable
    /// - ONNX Runtime initialization fails
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        preference: DevicePreference,
        intra_threads: usize,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Backbone model not found: {}", model_path.display());
        }

        info!("Loading DenseNet121 backbone from {}", model_path.display());

        let (session, device) = match preference {
            DevicePreference::Cpu => (
                build_session(model_path, ExecutionDevice::Cpu, intra_threads)?,
                ExecutionDevice::Cpu,
            ),
            DevicePreference::Cuda => (
                build_session(model_path, ExecutionDevice::Cuda, intra_threads)?,
                ExecutionDevice::Cuda,
            ),
            DevicePreference::Auto => {
                match build_session(model_path, ExecutionDevice::Cuda, intra_threads) {
                    Ok(session) => {
                        info!("✅ CUDA execution provider initialized");
                        (session, ExecutionDevice::Cuda)
                    }
                    Err(e) => {
                        warn!("⚠️  CUDA execution provider failed: {:#}", e);
                        warn!("   Falling back to CPU execution provider");
                        (
                            build_session(model_path, ExecutionDevice::Cpu, intra_threads)?,
                            ExecutionDevice::Cpu,
                        )
                    }
                }
            }
        };

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "input".to_string());

        debug!(
            "Backbone loaded - input: {}, outputs: {}",
            input_name,
            session.outputs.len()
        );

        info!("✅ DenseNet121 backbone loaded on {}", device);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            device,
        })
    }
}

fn build_session(path: &Path, device: ExecutionDevice, intra_threads: usize) -> Result<Session> {
    let provider = match device {
        ExecutionDevice::Cuda => CUDAExecutionProvider::default().build().error_on_failure(),
        ExecutionDevice::Cpu => CPUExecutionProvider::default().build(),
    };

    Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([provider])
        .with_context(|| format!("Failed to set {} execution provider", device))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(path)
        .with_context(|| format!("Failed to load backbone model from {}", path.display()))
}

impl FeatureExtractor for OnnxFeatureExtractor {
    fn extract(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let shape = input.shape();
        if shape[0] != 1 || shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [1, 3, H, W]", shape);
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("Backbone session lock poisoned"))?;

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Backbone inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract feature map")?;

        debug!("Backbone output shape: {:?}", output_tensor.shape());

        let features = output_tensor
            .to_owned()
            .into_dimensionality::<Ix4>()
            .context("Feature map is not 4-dimensional")?;

        Ok(features)
    }

    fn device(&self) -> ExecutionDevice {
        self.device
    }
}
