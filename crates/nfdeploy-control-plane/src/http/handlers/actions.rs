//! Action handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{error, warn};

use nfdeploy_core::{ActionFilter, ActionId, TaskStatus};

use crate::http::responses::{error_response, tracker_status, ActionListQuery};
use crate::state::AppState;
use crate::tracker::{ActionRequest, TrackerError};

/// Execute an action on a component.
///
/// POST /v1/components/:component/actions/:action
///
/// The JSON body (labels, tags) is optional; an empty body means none.
/// Returns 202 as soon as the action is running; progress is polled through
/// the task and action resources.
pub async fn execute_action(
    State(state): State<Arc<AppState>>,
    Path((component, action)): Path<(String, String)>,
    body: Bytes,
) -> impl IntoResponse {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ActionRequest::default()
    } else {
        match serde_json::from_slice::<ActionRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid action request body: {e}"),
                )
            }
        }
    };
    match state
        .tracker
        .execute_action(&component, &action, request)
        .await
    {
        Ok(view) => (StatusCode::ACCEPTED, Json(view)).into_response(),
        Err(e) => {
            match &e {
                TrackerError::Busy { .. } | TrackerError::Registry(_) => {
                    warn!(component = %component, action = %action, error = %e, "Action rejected")
                }
                _ => error!(component = %component, action = %action, error = %e, "Action failed to start"),
            }
            error_response(tracker_status(&e), e.to_string())
        }
    }
}

/// List recorded actions, newest first.
///
/// GET /v1/actions?component=k8s&status=failed&offset=0&limit=20
pub async fn list_actions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActionListQuery>,
) -> impl IntoResponse {
    let status = match query.status.as_deref().map(str::parse::<TaskStatus>) {
        None => None,
        Some(Ok(status)) => Some(status),
        Some(Err(e)) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let filter = ActionFilter {
        component: query.component,
        action: query.action,
        status,
        offset: query.offset,
        limit: query.limit,
    };

    match state.store().list_actions(&filter).await {
        Ok(actions) => Json(actions).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Get one recorded action.
///
/// GET /v1/actions/:action_id
pub async fn get_action(
    State(state): State<Arc<AppState>>,
    Path(action_id): Path<String>,
) -> impl IntoResponse {
    let id = ActionId::new(action_id);
    match state.store().get_action(&id).await {
        Ok(Some(action)) => Json(action).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("Action not found: {id}")),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
