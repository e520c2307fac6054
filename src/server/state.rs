//! Application state shared by all request handlers.

use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::pipeline::AccentPipeline;
use crate::reliability::{AnalyzerMetrics, GracefulShutdown};
use crate::server::stats::ServiceStats;
use crate::types::{MaxDuration, SampleRate};

/// Values applied when a request leaves a parameter out.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestDefaults {
    pub sample_rate: SampleRate,
    pub max_duration: MaxDuration,
}

/// Shared application state containing dependencies.
#[derive(Clone)]
pub struct AppState {
    /// The classification pipeline
    pub pipeline: Arc<dyn AccentPipeline>,

    /// Request counters for `/health`
    pub stats: Arc<ServiceStats>,

    /// Prometheus handle for `/metrics`, when a recorder is installed
    pub metrics: Option<AnalyzerMetrics>,

    /// Bounds the number of requests in flight
    pub limiter: Arc<Semaphore>,

    /// Root of every per-request cancellation token
    pub shutdown: GracefulShutdown,

    pub defaults: RequestDefaults,

    /// Body limit of the upload endpoint
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        pipeline: Arc<dyn AccentPipeline>,
        max_concurrent_requests: usize,
        shutdown: GracefulShutdown,
    ) -> Self {
        Self {
            pipeline,
            stats: Arc::new(ServiceStats::new()),
            metrics: None,
            limiter: Arc::new(Semaphore::new(max_concurrent_requests)),
            shutdown,
            defaults: RequestDefaults::default(),
            max_upload_bytes: crate::constants::server::MAX_UPLOAD_BYTES,
        }
    }

    /// State configured from `config`.
    pub fn from_config(
        config: &Config,
        pipeline: Arc<dyn AccentPipeline>,
        shutdown: GracefulShutdown,
    ) -> Self {
        let mut state = Self::new(pipeline, config.max_concurrent_requests, shutdown);
        state.defaults = RequestDefaults {
            sample_rate: config.default_sample_rate,
            max_duration: config.default_max_duration_minutes,
        };
        state.max_upload_bytes = config.max_upload_bytes;
        state
    }

    pub fn with_metrics(mut self, metrics: AnalyzerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
