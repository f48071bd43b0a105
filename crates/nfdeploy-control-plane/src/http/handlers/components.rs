//! Component state handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use crate::http::responses::{error_response, tracker_status, ComponentResponse};
use crate::state::AppState;

fn actions_of(state: &AppState, component: &str) -> Vec<String> {
    state
        .tracker
        .registry()
        .actions(component)
        .unwrap_or_default()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// List every component with its install status.
///
/// GET /v1/components
pub async fn list_components(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.tracker.component_states().await {
        Ok(states) => {
            let response: Vec<ComponentResponse> = states
                .into_iter()
                .map(|s| {
                    let actions = actions_of(&state, &s.component);
                    ComponentResponse::from_state(s, actions)
                })
                .collect();
            Json(response).into_response()
        }
        Err(e) => error_response(tracker_status(&e), e.to_string()),
    }
}

/// Get one component.
///
/// GET /v1/components/:component
pub async fn get_component(
    State(state): State<Arc<AppState>>,
    Path(component): Path<String>,
) -> impl IntoResponse {
    match state.tracker.component_state(&component).await {
        Ok(s) => {
            let actions = actions_of(&state, &component);
            Json(ComponentResponse::from_state(s, actions)).into_response()
        }
        Err(e) => error_response(tracker_status(&e), e.to_string()),
    }
}
