// HTTP/WebSocket surface: fleet snapshots, unit control, terminal bridge

mod ws;

use crate::error::Result;
use crate::fleet::models::UnitAction;
use crate::fleet::{Fleet, HostSnapshot, UnitController};
use crate::terminal::SessionRegistry;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub fleet: Arc<Fleet>,
    pub controller: Arc<UnitController>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(fleet: Arc<Fleet>) -> Self {
        Self {
            controller: Arc::new(UnitController::new(Arc::clone(&fleet))),
            registry: Arc::new(SessionRegistry::new(Arc::clone(&fleet))),
            fleet,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/fleet", get(fleet_snapshot))
        .route("/api/hosts/:hostname/units/:unit/:action", post(control_unit))
        .route("/ws", get(ws::ws_upgrade))
        .with_state(state)
}

/// Bind and serve until the process exits
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn fleet_snapshot(State(state): State<AppState>) -> Json<Vec<HostSnapshot>> {
    Json(state.fleet.snapshots().await)
}

#[derive(Serialize)]
struct ControlResponse {
    hostname: String,
    unit: String,
    action: &'static str,
    /// Raw supervisor output; absent when the command failed
    output: Option<String>,
}

async fn control_unit(
    State(state): State<AppState>,
    Path((hostname, unit, action)): Path<(String, String, String)>,
) -> std::result::Result<Json<ControlResponse>, StatusCode> {
    let Some(action) = UnitAction::parse(&action) else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let output = state.controller.apply(&hostname, &unit, action).await;
    Ok(Json(ControlResponse {
        hostname,
        unit,
        action: action.verb(),
        output,
    }))
}
