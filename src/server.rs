use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    dispatch::Dispatcher,
    poller::SnapshotCache,
    prober::Prober,
    types::Verbosity,
};

/// Everything the read-model API needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    cache: SnapshotCache,
    prober: Arc<Prober>,
    dispatcher: Dispatcher,
    verbosity: Verbosity,
}

impl AppState {
    pub fn new(
        cache: SnapshotCache,
        prober: Prober,
        dispatcher: Dispatcher,
        verbosity: Verbosity,
    ) -> Self {
        Self {
            cache,
            prober: Arc::new(prober),
            dispatcher,
            verbosity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub port: u16,
    pub app_id: u64,
    pub asset_id: String,
    pub asset_base_id: String,
    pub resolution: String,
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadResponse {
    pub scheduled: bool,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/clients", get(get_clients))
        .route("/softwares", get(get_softwares))
        .route("/scan", post(post_scan))
        .route("/download", post(post_download))
        .with_state(state);

    Router::new().nest("/api", api).layer(TraceLayer::new_for_http())
}

pub async fn spawn_server(bind: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "serving client snapshot API");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn get_clients(State(app): State<AppState>) -> impl IntoResponse {
    let snapshot = app.cache.snapshot();
    (StatusCode::OK, Json(snapshot.as_ref().clone()))
}

async fn get_softwares(State(app): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(app.cache.softwares()))
}

async fn post_scan(State(app): State<AppState>) -> impl IntoResponse {
    match app.prober.scan(app.verbosity).await {
        Ok(clients) => {
            let snapshot = app.cache.replace(clients);
            (StatusCode::OK, Json(snapshot.as_ref().clone())).into_response()
        }
        Err(e) => {
            warn!(error = %e, "on-demand scan failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("scan failed: {e}")).into_response()
        }
    }
}

async fn post_download(
    State(app): State<AppState>,
    Json(req): Json<DownloadRequest>,
) -> impl IntoResponse {
    let scheduled = app
        .dispatcher
        .download_asset_to_software(
            req.port,
            req.app_id,
            &req.asset_id,
            &req.asset_base_id,
            &req.resolution,
            &req.api_key,
        )
        .await;
    let code = if scheduled {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (code, Json(DownloadResponse { scheduled }))
}
