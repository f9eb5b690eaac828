//! Prometheus metrics
//!
//! Each service owns one `Metrics` value with its own registry. It records
//! HTTP request latency by route, method and status code, plus the duration
//! and failures of every job stage.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Content type of the rendered exposition text
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Metric families shared by the worker and the gateway
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    http_requests: HistogramVec,
    stage_duration: HistogramVec,
    stage_failures: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "The latency of the HTTP requests.",
            ),
            &["handler", "method", "code"],
        )?;
        let stage_duration = HistogramVec::new(
            HistogramOpts::new("stage_duration_seconds", "Duration of job stages."),
            &["stage"],
        )?;
        let stage_failures = IntCounterVec::new(
            Opts::new("stage_failures_total", "Job stages that ended in failure."),
            &["stage"],
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(stage_duration.clone()))?;
        registry.register(Box::new(stage_failures.clone()))?;

        Ok(Self {
            registry,
            http_requests,
            stage_duration,
            stage_failures,
        })
    }

    pub fn observe_request(&self, handler: &str, method: &str, code: u16, elapsed: Duration) {
        let code = code.to_string();
        self.http_requests
            .with_label_values(&[handler, method, code.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn observe_stage(&self, stage: &str, elapsed: Duration) {
        self.stage_duration
            .with_label_values(&[stage])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_failure(&self, stage: &str) {
        self.stage_failures.with_label_values(&[stage]).inc();
    }

    /// Text exposition of every registered family
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
