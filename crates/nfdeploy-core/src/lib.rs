//! nfdeploy Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Subprocesses
//! - Storage
//! - Runtime specifics
//!
//! All types here represent the core business domain of nfdeploy: tasks run
//! by the command runner, the durable action history, and the per-component
//! install state derived from it.

pub mod action;
pub mod component;
pub mod error;
pub mod ids;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use action::{ActionClass, ActionFilter, ActionRecord, ActionResult, ActionView, DEFAULT_PAGE_SIZE};
pub use component::ComponentState;
pub use error::CoreError;
pub use ids::{ActionId, TaskId};
pub use status::{ComponentStatus, TaskStatus};
pub use task::{OutputChunk, TaskFilter, TaskSpec, TaskView};
