//! Prometheus metrics collection and export.
//!
//! Covers request counts, failures by error kind, label distribution, per-stage
//! latency and in-flight requests.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{AnalysisError, Result};
use crate::types::AccentClass;

pub const REQUESTS_TOTAL: &str = "accent_requests_total";
pub const REQUESTS_FAILED_TOTAL: &str = "accent_requests_failed_total";
pub const LABELS_TOTAL: &str = "accent_label_total";
pub const REQUEST_DURATION_SECONDS: &str = "accent_request_duration_seconds";
pub const STAGE_DURATION_SECONDS: &str = "accent_stage_duration_seconds";
pub const AUDIO_DURATION_SECONDS: &str = "accent_audio_duration_seconds";
pub const REQUESTS_ACTIVE: &str = "accent_requests_active";

/// Handle onto the Prometheus registry backing `/metrics`.
#[derive(Clone)]
pub struct AnalyzerMetrics {
    prometheus_handle: PrometheusHandle,
}

impl AnalyzerMetrics {
    /// Install the global recorder. Fails if one is already installed.
    pub fn install() -> Result<Self> {
        let prometheus_handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| AnalysisError::Configuration(format!("metrics recorder: {}", e)))?;

        Self::register_metrics();
        info!("Metrics collection initialized");

        Ok(Self { prometheus_handle })
    }

    /// Build a recorder without installing it globally.
    ///
    /// Pair with [`metrics::with_local_recorder`] to capture metrics in tests.
    pub fn detached() -> (Self, PrometheusRecorder) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let metrics = Self {
            prometheus_handle: recorder.handle(),
        };
        (metrics, recorder)
    }

    /// Register all metrics with their descriptions.
    pub fn register_metrics() {
        describe_counter!(REQUESTS_TOTAL, "Total number of classification requests received");
        describe_counter!(
            REQUESTS_FAILED_TOTAL,
            "Total number of failed classification requests by error kind"
        );
        describe_counter!(LABELS_TOTAL, "Selected accent labels");
        describe_histogram!(
            REQUEST_DURATION_SECONDS,
            "End-to-end classification latency in seconds"
        );
        describe_histogram!(
            STAGE_DURATION_SECONDS,
            "Latency of each pipeline stage in seconds"
        );
        describe_histogram!(
            AUDIO_DURATION_SECONDS,
            "Duration of normalised clips in seconds"
        );
        describe_gauge!(REQUESTS_ACTIVE, "Classification requests in flight");
    }

    /// Get the Prometheus metrics as a string.
    pub fn render(&self) -> String {
        self.prometheus_handle.render()
    }

    /// Response body for the /metrics endpoint.
    pub fn exposition(&self) -> Response {
        (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            self.render(),
        )
            .into_response()
    }
}

/// Holds one request on the in-flight gauge until dropped, so a request
/// that unwinds still leaves the gauge.
#[must_use = "the request leaves the in-flight gauge when this is dropped"]
#[derive(Debug)]
pub struct ActiveRequest {
    _private: (),
}

impl ActiveRequest {
    /// Count a new request from `source` and mark it in flight.
    pub fn start(source: &'static str) -> Self {
        counter!(REQUESTS_TOTAL, "source" => source).increment(1);
        gauge!(REQUESTS_ACTIVE).increment(1.0);
        Self { _private: () }
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        gauge!(REQUESTS_ACTIVE).decrement(1.0);
    }
}

/// Record the latency of a finished request, successful or not.
pub fn record_request_end(elapsed: Duration) {
    histogram!(REQUEST_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

/// Record a failed request.
pub fn record_request_failure(error: &AnalysisError) {
    counter!(REQUESTS_FAILED_TOTAL, "kind" => error.kind()).increment(1);
}

/// Record the label chosen for a successful request.
pub fn record_label(label: AccentClass) {
    counter!(LABELS_TOTAL, "label" => label.as_str()).increment(1);
}

pub fn record_stage_duration(stage: &'static str, elapsed: Duration) {
    histogram!(STAGE_DURATION_SECONDS, "stage" => stage).record(elapsed.as_secs_f64());
    debug!("Stage '{}' took {:.3}ms", stage, elapsed.as_secs_f64() * 1000.0);
}

pub fn record_audio_duration(secs: f64) {
    histogram!(AUDIO_DURATION_SECONDS).record(secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_metrics_render() {
        let (metrics, recorder) = AnalyzerMetrics::detached();
        metrics::with_local_recorder(&recorder, || {
            AnalyzerMetrics::register_metrics();
            let active = ActiveRequest::start("upload");
            record_label(AccentClass::British);
            record_request_failure(&AnalysisError::Download("unreachable".into()));
            record_stage_duration("extracting_features", Duration::from_millis(15));
            record_stage_duration("normalizing", Duration::from_millis(3));
            record_audio_duration(12.5);
            record_request_end(Duration::from_millis(40));
            drop(active);
        });

        let body = metrics.render();
        assert!(body.contains("accent_requests_total{source=\"upload\"} 1"));
        assert!(body.contains("accent_label_total{label=\"British\"} 1"));
        assert!(body.contains("kind=\"DownloadError\""));
        assert!(body.contains("stage=\"extracting_features\""));
        assert!(body.contains("stage=\"normalizing\""));
        assert!(body.contains("accent_requests_active 0"));
    }

    #[test]
    fn test_active_gauge_released_on_panic() {
        let (metrics, recorder) = AnalyzerMetrics::detached();
        metrics::with_local_recorder(&recorder, || {
            let unwound = std::panic::catch_unwind(|| {
                let _active = ActiveRequest::start("upload");
                panic!("stage bug");
            });
            assert!(unwound.is_err());
        });

        let body = metrics.render();
        assert!(body.contains("accent_requests_total{source=\"upload\"} 1"));
        assert!(body.contains("accent_requests_active 0"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let active = ActiveRequest::start("url");
        record_request_end(Duration::from_millis(1));
        record_label(AccentClass::Indian);
        drop(active);
    }
}
