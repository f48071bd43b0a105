//! HTTP request handlers.

mod actions;
mod components;
mod health;
mod tasks;

pub use actions::{execute_action, get_action, list_actions};
pub use components::{get_component, list_components};
pub use health::{health_check, metrics_handler};
pub use tasks::{cancel_task, get_task, get_task_output, list_tasks};
