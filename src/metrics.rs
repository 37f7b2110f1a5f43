// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prometheus metrics for the HTTP API
//!
//! Exposed metrics:
//! - `fracture_api_requests_total{endpoint,status}` - requests by endpoint and HTTP status
//! - `fracture_api_predictions_total{label}` - successful predictions by label
//! - `fracture_api_analyze_duration_seconds` - `/analyze` processing time

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

/// Buckets sized for a CPU DenseNet121 pass (tens of ms to seconds)
const DURATION_BUCKETS: &[f64] = &[0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

pub struct ApiMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    predictions_total: IntCounterVec,
    analyze_duration: Histogram,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("fracture_api_requests_total", "HTTP requests by endpoint and status"),
            &["endpoint", "status"],
        )?;
        let predictions_total = IntCounterVec::new(
            Opts::new("fracture_api_predictions_total", "Predictions by label"),
            &["label"],
        )?;
        let analyze_duration = Histogram::with_opts(
            HistogramOpts::new(
                "fracture_api_analyze_duration_seconds",
                "Time spent processing /analyze requests",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(predictions_total.clone()))?;
        registry.register(Box::new(analyze_duration.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            predictions_total,
            analyze_duration,
        })
    }

    pub fn record_request(&self, endpoint: &str, status: u16) {
        self.requests_total
            .with_label_values(&[endpoint, &status.to_string()])
            .inc();
    }

    pub fn record_prediction(&self, label: &str) {
        self.predictions_total.with_label_values(&[label]).inc();
    }

    pub fn observe_analyze_duration(&self, seconds: f64) {
        self.analyze_duration.observe(seconds);
    }

    /// Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
