//! API handlers.
//!
//! Each handler checks field presence, hands off to an orchestrator and
//! maps the outcome onto a status code and JSON body.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::debug;

use fleetgate_orchestrator::{AuthFailure, ClusterRemoval, CoordinatorError, LeaveOutcome, Step};

use crate::ApiState;
use crate::wire::{JoinBody, JoinCompleteBody, LeaveBody};

fn error_response(msg: &str, status: StatusCode) -> Response {
    (status, Json(json!({ "status": "error", "error": msg }))).into_response()
}

/// HTTP status for a coordinator failure.
pub fn status_for(err: &CoordinatorError) -> StatusCode {
    match err {
        CoordinatorError::Validation(_) => StatusCode::BAD_REQUEST,
        CoordinatorError::Auth(_) => StatusCode::UNAUTHORIZED,
        CoordinatorError::ExternalTool(_) | CoordinatorError::Storage(_) | CoordinatorError::Partial { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn coordinator_error(err: CoordinatorError) -> Response {
    let status = status_for(&err);
    match err {
        CoordinatorError::Partial { message, report } => (
            status,
            Json(json!({ "status": "partial", "error": message, "steps": report })),
        )
            .into_response(),
        CoordinatorError::Auth(AuthFailure::InvalidToken) => error_response("invalid token", status),
        CoordinatorError::Auth(AuthFailure::InvalidCredentials) => error_response("invalid credentials", status),
        other => error_response(&other.to_string(), status),
    }
}

/// POST /join
pub async fn join(State(state): State<ApiState>, payload: Result<Json<JoinBody>, JsonRejection>) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return error_response(&rejection.body_text(), StatusCode::BAD_REQUEST),
    };
    let request = match body.into_request() {
        Ok(request) => request,
        Err(missing) => return error_response(&missing.to_string(), StatusCode::BAD_REQUEST),
    };
    debug!(username = %request.username, with_hardware = request.hardware.is_some(), "join requested");

    match state.join.join(&request).await {
        Ok(report) => Json(json!({ "status": "ok", "steps": report })).into_response(),
        Err(e) => coordinator_error(e),
    }
}

/// POST /join-complete
pub async fn join_complete(
    State(state): State<ApiState>,
    payload: Result<Json<JoinCompleteBody>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return error_response(&rejection.body_text(), StatusCode::BAD_REQUEST),
    };
    let (username, hardware) = match body.into_parts() {
        Ok(parts) => parts,
        Err(missing) => return error_response(&missing.to_string(), StatusCode::BAD_REQUEST),
    };
    debug!(%username, node = %hardware.name, "registration requested");

    match state.join.register(&username, &hardware).await {
        Ok(report) => Json(json!({ "status": "registered", "steps": report })).into_response(),
        Err(e) => coordinator_error(e),
    }
}

/// POST /leave
pub async fn leave(State(state): State<ApiState>, payload: Result<Json<LeaveBody>, JsonRejection>) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return error_response(&rejection.body_text(), StatusCode::BAD_REQUEST),
    };
    let params = match body.into_params() {
        Ok(params) => params,
        Err(missing) => return error_response(&missing.to_string(), StatusCode::BAD_REQUEST),
    };
    debug!(username = %params.username, node = %params.node_name, "leave requested");

    match state
        .leave
        .leave(&params.node_name, &params.username, &params.password)
        .await
    {
        Ok(outcome) => leave_response(outcome),
        Err(e) => coordinator_error(e),
    }
}

fn leave_response(outcome: LeaveOutcome) -> Response {
    let database = if outcome.rows_deleted == 0 {
        "no registry row for node"
    } else {
        "registry row deleted"
    };
    match outcome.removal {
        ClusterRemoval::Removed => {
            let cluster = outcome
                .report
                .get(Step::InvokeClusterRemoval)
                .and_then(|status| status.detail.clone())
                .unwrap_or_default();
            Json(json!({
                "status": "ok",
                "message": format!("node {} removed", outcome.node_name),
                "details": {
                    "cluster": cluster,
                    "database": database,
                    "rowsDeleted": outcome.rows_deleted,
                },
            }))
            .into_response()
        }
        ClusterRemoval::NotPresent => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": "not_found",
                "message": format!("node {} not present in cluster", outcome.node_name),
                "details": {
                    "database": database,
                    "rowsDeleted": outcome.rows_deleted,
                },
            })),
        )
            .into_response(),
    }
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
