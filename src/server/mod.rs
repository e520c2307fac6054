//! HTTP boundary around the classification pipeline.

mod handlers;
mod state;
mod stats;

pub use handlers::{
    classify_upload, classify_url, create_router, health_check, list_profiles, metrics_handler,
    ClassifyParams, ClassifyUrlRequest,
};
pub use state::{AppState, RequestDefaults};
pub use stats::ServiceStats;

use std::sync::Arc;
use tracing::info;

use crate::error::{AnalysisError, Result};

/// Bind `addr` and serve until the shutdown token fires.
pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AnalysisError::Configuration(format!("cannot bind {}: {}", addr, e)))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AnalysisError::Internal(format!("server error: {}", e)))?;

    info!("Server stopped");
    Ok(())
}
