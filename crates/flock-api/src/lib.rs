//! flock-api — the directory REST surface.
//!
//! Thin axum layer over the `ServerManager`. Client-facing routes absorb
//! internal trouble into safe defaults (backup address, empty list);
//! they never surface an error to an end client.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/assignment` | Address of the server to connect to |
//! | GET | `/api/v1/servers` | Addresses of all available servers |
//! | POST | `/api/v1/servers` | Request one more server now |
//! | GET | `/api/v1/status` | Operator snapshot of both pools |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use flock_pool::ServerManager;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<ServerManager>,
}

/// Build the directory router.
pub fn build_router(manager: Arc<ServerManager>) -> Router {
    let state = ApiState { manager };

    let api_routes = Router::new()
        .route("/assignment", get(handlers::get_assignment))
        .route(
            "/servers",
            get(handlers::list_servers).post(handlers::add_server),
        )
        .route("/status", get(handlers::fleet_status))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
