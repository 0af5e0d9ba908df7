//! fleetgate-api — HTTP surface of the control-plane coordinator.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/join` | Authenticate, join the cluster, optionally register hardware |
//! | POST | `/join-complete` | Register a joined node's hardware and scrape targets |
//! | POST | `/leave` | Remove a node from the cluster and the registry |
//! | GET | `/healthz` | Liveness |
//!
//! Request bodies are camelCase JSON; the snake_case names of older
//! clients are accepted as aliases.

pub mod handlers;
pub mod wire;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use fleetgate_orchestrator::{JoinOrchestrator, LeaveOrchestrator};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub join: Arc<JoinOrchestrator>,
    pub leave: Arc<LeaveOrchestrator>,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/join", post(handlers::join))
        .route("/join-complete", post(handlers::join_complete))
        .route("/leave", post(handlers::leave))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}
