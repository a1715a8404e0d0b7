//! HTTP API consumed by the dashboard front-end
//!
//! - `GET  /health`
//! - `GET  /indicators`, `GET /regions`
//! - `GET  /data/:indicator?region=&year=&gender=` raw data points, cache-aside
//! - `GET  /multiple?indicators=&region=&year=` raw data points per indicator
//! - `GET  /metric/:indicator?region=&year=` resolved metric, never fails for known indicators
//! - `GET  /area/:area?region=&year=` resolved metrics of one subject area
//! - `GET  /trend/:indicator?points=` simulated monthly series
//! - `POST /sync` with `{region, year}` catalog-wide sync summary

mod error;
mod routes;

pub use error::{ApiError, ApiResult};

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::resolver::MetricResolver;
use crate::sync::{SyncJob, SyncSchedule, SyncScheduler};

/// Shared state of all handlers
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<MetricResolver>,
    /// Shared with the periodic scheduler when one runs
    pub sync: Arc<SyncJob>,
    /// Region used when a request names none
    pub default_region: String,
}

impl AppState {
    pub fn new(resolver: Arc<MetricResolver>, default_region: impl Into<String>) -> Self {
        let sync = Arc::new(SyncJob::new(resolver.clone()));
        Self {
            resolver,
            sync,
            default_region: default_region.into(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/indicators", get(routes::indicators))
        .route("/regions", get(routes::regions))
        .route("/data/:indicator", get(routes::indicator_data))
        .route("/multiple", get(routes::multiple))
        .route("/metric/:indicator", get(routes::metric))
        .route("/area/:area", get(routes::area))
        .route("/trend/:indicator", get(routes::trend))
        .route("/sync", post(routes::sync))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serves the API until Ctrl-C, optionally running periodic syncs
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    schedule: Option<SyncSchedule>,
) -> std::io::Result<()> {
    let scheduler = schedule.map(|schedule| {
        info!(interval = ?schedule.interval, region = %schedule.region, "periodic sync enabled");
        SyncScheduler::spawn(state.sync.clone(), schedule)
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "kpiboard API listening");

    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    Ok(())
}
