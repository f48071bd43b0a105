//! HTTP request and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use nfdeploy_core::{ActionId, ComponentState, ComponentStatus};

use crate::runner::RunnerError;
use crate::tracker::TrackerError;

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Build an error response with the given status.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Status code an operator sees for a tracker error.
pub fn tracker_status(e: &TrackerError) -> StatusCode {
    match e {
        TrackerError::Registry(_) => StatusCode::NOT_FOUND,
        TrackerError::Busy { .. } => StatusCode::CONFLICT,
        TrackerError::Submit(_) | TrackerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Status code an operator sees for a runner error.
pub fn runner_status(e: &RunnerError) -> StatusCode {
    match e {
        RunnerError::NotFound(_) => StatusCode::NOT_FOUND,
        RunnerError::NotRunning(_) | RunnerError::ConcurrencyLimit { .. } => StatusCode::CONFLICT,
        RunnerError::CommandNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Task types
// ============================================================================

/// Query string for task listings.
#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    /// Exact status, e.g. `running`.
    pub status: Option<String>,

    /// Comma separated `key=value` label requirements.
    pub label: Option<String>,
}

/// Query string for output reads.
#[derive(Debug, Default, Deserialize)]
pub struct OutputQuery {
    #[serde(default)]
    pub offset: usize,
}

/// Output read response.
#[derive(Debug, Serialize)]
pub struct OutputResponse {
    pub task_id: String,

    /// Output since the requested offset, decoded as UTF-8. While the task
    /// runs, a trailing partial character is held back for the next poll.
    pub data: String,

    /// Offset to request next.
    pub new_offset: usize,
}

// ============================================================================
// Action types
// ============================================================================

/// Query string for action listings.
#[derive(Debug, Default, Deserialize)]
pub struct ActionListQuery {
    pub component: Option<String>,
    pub action: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

// ============================================================================
// Component types
// ============================================================================

/// Response for a single component.
#[derive(Debug, Serialize)]
pub struct ComponentResponse {
    pub component: String,
    pub status: ComponentStatus,
    pub last_action: Option<String>,
    pub action_id: Option<ActionId>,
    pub updated_at: String,

    /// Actions that can be executed on this component.
    pub actions: Vec<String>,
}

impl ComponentResponse {
    pub fn from_state(state: ComponentState, actions: Vec<String>) -> Self {
        Self {
            component: state.component,
            status: state.status,
            last_action: state.last_action,
            action_id: state.action_id,
            updated_at: state.updated_at.to_rfc3339(),
            actions,
        }
    }
}
