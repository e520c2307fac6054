//! Reliability and observability: graceful shutdown, Prometheus metrics and
//! tracing setup.

pub mod graceful_shutdown;
pub mod metrics;
pub mod tracing;

pub use self::graceful_shutdown::GracefulShutdown;
pub use self::metrics::AnalyzerMetrics;
pub use self::tracing::{init_tracing, shutdown_tracing, TracingConfig};
