//! HTTP/WebSocket transport (spec §6). An external collaborator per spec
//! §1 scope, but wired up here since `axum` is already a teacher
//! dependency and something has to drive the orchestrator and expose the
//! REST surface.

pub mod rest;
pub mod ws;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::store::Store;

/// Shared across every request/connection. `write_lock` serializes the
/// store writers the REST ingest endpoint and the CLI ingestor would
/// otherwise race on (spec §5 "a simple process-wide writer lock is
/// acceptable"); the live matcher never writes, so it never takes it.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub write_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self { store: Arc::new(store), write_lock: Arc::new(Mutex::new(())) }
    }
}

pub fn router(state: AppState, settings: &Settings) -> Router {
    let cors = build_cors(settings);

    Router::new()
        .route("/ws/recognize", get(ws::ws_handler))
        .route("/api/recognize", post(rest::recognize))
        .route("/api/songs", get(rest::list_songs).post(rest::add_song))
        .route("/api/songs/{id}", delete(rest::delete_song))
        .route("/api/stats", get(rest::stats))
        .route("/api/health", get(rest::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
