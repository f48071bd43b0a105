//! Durable storage for action history and component state.
//!
//! The control plane only talks to storage through [`Store`]. Two
//! implementations ship with it: [`MemoryStore`] for tests and throwaway
//! deployments, and [`FileStore`] which keeps the same data in a JSON file.

mod data;
mod file;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use nfdeploy_core::{ActionFilter, ActionId, ActionRecord, ActionResult, ComponentState, CoreError};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] CoreError),

    #[error("Action already exists: {0}")]
    DuplicateAction(ActionId),

    #[error("Action not found: {0}")]
    ActionNotFound(ActionId),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Action and component-state persistence.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a new action. Fails on a missing id, component, action or target.
    async fn insert_action(&self, record: ActionRecord) -> Result<(), StoreError>;

    /// Record the terminal outcome of an action.
    async fn update_action_result(&self, id: &ActionId, result: ActionResult) -> Result<(), StoreError>;

    async fn get_action(&self, id: &ActionId) -> Result<Option<ActionRecord>, StoreError>;

    /// Matching actions, most recently started first, paginated by the filter.
    async fn list_actions(&self, filter: &ActionFilter) -> Result<Vec<ActionRecord>, StoreError>;

    /// Insert or replace the state of one component.
    async fn upsert_component_state(&self, state: ComponentState) -> Result<(), StoreError>;

    async fn get_component_state(&self, component: &str) -> Result<Option<ComponentState>, StoreError>;

    /// Every persisted component state, ordered by component name.
    async fn list_component_states(&self) -> Result<Vec<ComponentState>, StoreError>;
}
