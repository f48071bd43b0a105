//! Runner task handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;

use nfdeploy_core::{TaskFilter, TaskId, TaskStatus};

use crate::config::parse_env_pair;
use crate::http::responses::{
    error_response, runner_status, OutputQuery, OutputResponse, TaskListQuery,
};
use crate::state::AppState;

/// List tasks, newest first.
///
/// GET /v1/tasks?status=running&label=component=k8s
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskListQuery>,
) -> impl IntoResponse {
    let mut filter = TaskFilter::default();
    if let Some(raw) = query.status.as_deref() {
        match raw.parse::<TaskStatus>() {
            Ok(status) => filter.status = Some(status),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }
    for pair in query.label.iter().flat_map(|l| l.split(',')) {
        match parse_env_pair(pair) {
            Ok((key, value)) => {
                filter.labels.insert(key, value);
            }
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        }
    }

    Json(state.runner().list(&filter).await).into_response()
}

/// Get one task.
///
/// GET /v1/tasks/:task_id
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    match state.runner().get(&TaskId::new(task_id)).await {
        Ok(task) => Json(task).into_response(),
        Err(e) => error_response(runner_status(&e), e.to_string()),
    }
}

/// Read task output from an offset.
///
/// GET /v1/tasks/:task_id/output?offset=N
pub async fn get_task_output(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    Query(query): Query<OutputQuery>,
) -> impl IntoResponse {
    let id = TaskId::new(task_id);

    // Status first: once terminal, the buffer is complete.
    let running = match state.runner().get(&id).await {
        Ok(task) => !task.is_terminal(),
        Err(e) => return error_response(runner_status(&e), e.to_string()),
    };

    match state.runner().output(&id, query.offset).await {
        Ok(chunk) => {
            // A character split across pump reads is returned whole on a later poll.
            let chunk = if running {
                chunk.hold_partial_char()
            } else {
                chunk
            };
            Json(OutputResponse {
                task_id: id.into_inner(),
                data: chunk.text(),
                new_offset: chunk.new_offset,
            })
            .into_response()
        }
        Err(e) => error_response(runner_status(&e), e.to_string()),
    }
}

/// Request cancellation of a running task.
///
/// POST /v1/tasks/:task_id/cancel
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    let id = TaskId::new(task_id);
    match state.runner().cancel(&id).await {
        Ok(()) => {
            info!(task_id = %id, "Cancellation requested via API");
            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({ "task_id": id.as_str(), "cancel_requested": true })),
            )
                .into_response()
        }
        Err(e) => error_response(runner_status(&e), e.to_string()),
    }
}
