//! Logging and distributed tracing setup with OpenTelemetry and Jaeger.
//!
//! Console output is compact text by default or JSON lines when configured.
//! Span export to Jaeger is optional and never blocks startup.

use opentelemetry::global;
use opentelemetry_jaeger::new_agent_pipeline;
use tracing::{info, warn};
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

use crate::config::Config;

/// Configuration for logging and distributed tracing.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name for tracing.
    pub service_name: String,
    /// Jaeger agent endpoint; no spans are exported when unset.
    pub jaeger_endpoint: Option<String>,
    /// Emit JSON lines instead of compact text.
    pub log_json: bool,
    /// Log level filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "accent-analyzer".to_string(),
            jaeger_endpoint: None,
            log_json: false,
            log_level: "info".to_string(),
        }
    }
}

impl From<&Config> for TracingConfig {
    fn from(config: &Config) -> Self {
        Self {
            service_name: config.service_name.clone(),
            jaeger_endpoint: config.jaeger_endpoint.clone(),
            log_json: config.log_json,
            log_level: config.log_level.clone(),
        }
    }
}

/// Install the global subscriber.
pub fn init_tracing(config: TracingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let tracer = match &config.jaeger_endpoint {
        Some(endpoint) => match new_agent_pipeline()
            .with_service_name(&config.service_name)
            .with_endpoint(endpoint)
            .install_simple()
        {
            Ok(tracer) => Some(tracer),
            Err(e) => {
                // The subscriber is not installed yet, so this goes to stderr.
                eprintln!(
                    "Failed to initialize Jaeger tracing: {}. Continuing without distributed tracing.",
                    e
                );
                None
            }
        },
        None => None,
    };
    let exporting = tracer.is_some();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let json_layer = config.log_json.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
    });
    let text_layer = (!config.log_json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .compact()
    });

    Registry::default()
        .with(env_filter)
        .with(tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t)))
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    info!(
        service = %config.service_name,
        json = config.log_json,
        jaeger = exporting,
        "Tracing initialized"
    );
    if config.jaeger_endpoint.is_some() && !exporting {
        warn!("Jaeger endpoint configured but exporter unavailable");
    }
    Ok(())
}

/// Shutdown tracing and flush any pending spans.
pub fn shutdown_tracing() {
    info!("Shutting down tracing");
    global::shutdown_tracer_provider();
}

/// Create a tracing span for one classification request.
#[macro_export]
macro_rules! analysis_span {
    ($name:expr) => {
        tracing::info_span!($name,
            request_id = tracing::field::Empty,
            sample_rate = tracing::field::Empty,
            audio_duration_ms = tracing::field::Empty,
            label = tracing::field::Empty,
            processing_time_ms = tracing::field::Empty,
        )
    };
    ($name:expr, $($key:ident = $value:expr),*) => {
        tracing::info_span!($name,
            request_id = tracing::field::Empty,
            sample_rate = tracing::field::Empty,
            audio_duration_ms = tracing::field::Empty,
            label = tracing::field::Empty,
            processing_time_ms = tracing::field::Empty,
            $($key = $value),*
        )
    };
}

/// Utilities for adding common fields to spans.
pub mod span_utils {
    use tracing::Span;
    use uuid::Uuid;

    pub fn add_request_id(span: &Span, request_id: &Uuid) {
        span.record("request_id", request_id.to_string());
    }

    pub fn add_sample_rate(span: &Span, rate: u32) {
        span.record("sample_rate", rate);
    }

    pub fn add_audio_duration(span: &Span, duration_ms: u64) {
        span.record("audio_duration_ms", duration_ms);
    }

    pub fn add_label(span: &Span, label: &str) {
        span.record("label", label);
    }

    pub fn add_processing_time(span: &Span, time_ms: u64) {
        span.record("processing_time_ms", time_ms);
    }
}
