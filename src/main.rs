//! Accent classification server.
//!
//! Loads configuration, initialises tracing and metrics, loads the accent
//! profile table and serves the HTTP API until SIGINT/SIGTERM.

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use accent_analyzer::{
    config::Config,
    pipeline::AnalysisPipeline,
    reliability::{init_tracing, shutdown_tracing, AnalyzerMetrics, GracefulShutdown, TracingConfig},
    server::{serve, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    init_tracing(TracingConfig::from(&config))
        .map_err(|e| anyhow::anyhow!("initializing tracing: {}", e))?;

    let metrics = AnalyzerMetrics::install().context("installing metrics recorder")?;

    let table = Arc::new(config.profile_table().context("loading accent profiles")?);
    info!("Loaded {} accent profiles", table.len());

    let pipeline = AnalysisPipeline::from_config(&config, table).context("building pipeline")?;

    let shutdown = GracefulShutdown::new();
    shutdown.listen_for_signals();

    let state = AppState::from_config(&config, Arc::new(pipeline), shutdown.clone())
        .with_metrics(metrics);
    let addr = format!("{}:{}", config.server_host, config.server_port);

    let result = serve(&addr, Arc::new(state)).await;
    if let Err(e) = &result {
        warn!("Server exited with error: {}", e);
    }

    shutdown_tracing();
    result.context("running server")
}
