//! Directory API handlers.
//!
//! Each handler delegates to the shared `ServerManager`. The assignment
//! route is the hot path game clients hit before connecting; it always
//! returns an address because the manager substitutes the backup address
//! for an empty pool.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::ApiState;

/// Body of `GET /api/v1/assignment`.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct AssignmentResponse {
    pub address: String,
}

/// Body of `GET /api/v1/servers`.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ServerListResponse {
    pub servers: Vec<String>,
}

/// Body of `POST /api/v1/servers`.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct AddServerResponse {
    /// Whether this request triggered a provisioning attempt. False when a
    /// cycle or another add already had one in flight.
    pub triggered: bool,
}

/// GET /api/v1/assignment
pub async fn get_assignment(State(state): State<ApiState>) -> impl IntoResponse {
    let address = state.manager.assignment().await;
    Json(AssignmentResponse { address })
}

/// GET /api/v1/servers
pub async fn list_servers(State(state): State<ApiState>) -> impl IntoResponse {
    let servers = state.manager.list_available().await;
    Json(ServerListResponse { servers })
}

/// POST /api/v1/servers
pub async fn add_server(State(state): State<ApiState>) -> impl IntoResponse {
    let triggered = state.manager.request_add_server_now().await;
    (StatusCode::ACCEPTED, Json(AddServerResponse { triggered }))
}

/// GET /api/v1/status
pub async fn fleet_status(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.manager.snapshot().await)
}
