//! HTTP surface: the two websocket upgrade endpoints, the device listing,
//! and static file serving for the browser frontend.

use std::path::Path;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::{Json, Redirect, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tower_http::services::ServeDir;

use crate::broker::SessionBroker;
use crate::connection;
use crate::registry::DeviceRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: DeviceRegistry,
    pub broker: SessionBroker,
}

impl AppState {
    pub fn new(registry: DeviceRegistry) -> Self {
        let broker = SessionBroker::new(registry.clone());
        Self { registry, broker }
    }
}

/// Both upgrade endpoints carry the target device id in the query string;
/// a missing `did` is rejected with 400 before the upgrade.
#[derive(Deserialize)]
struct WsQuery {
    did: String,
}

pub fn app(state: AppState, document: &Path) -> Router {
    Router::new()
        .route("/list", get(list))
        .route("/", get(|| async { Redirect::temporary("/ttylink.html") }))
        .route("/ws/device", get(device_ws))
        .route("/ws/browser", get(browser_ws))
        .fallback_service(ServeDir::new(document))
        .with_state(state)
}

/// Ids of all currently registered devices.
async fn list(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry.device_ids().await)
}

async fn device_ws(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| connection::device(socket, query.did, state.registry))
}

async fn browser_ws(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| connection::browser(socket, query.did, state.registry, state.broker))
}
