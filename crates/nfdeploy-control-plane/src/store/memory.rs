//! Process-local store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use nfdeploy_core::{ActionFilter, ActionId, ActionRecord, ActionResult, ComponentState};

use super::data::StoreData;
use super::{Store, StoreError};

/// Store that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_action(&self, record: ActionRecord) -> Result<(), StoreError> {
        self.data.write().await.insert_action(record)
    }

    async fn update_action_result(&self, id: &ActionId, result: ActionResult) -> Result<(), StoreError> {
        self.data.write().await.update_action_result(id, result)
    }

    async fn get_action(&self, id: &ActionId) -> Result<Option<ActionRecord>, StoreError> {
        Ok(self.data.read().await.get_action(id))
    }

    async fn list_actions(&self, filter: &ActionFilter) -> Result<Vec<ActionRecord>, StoreError> {
        Ok(self.data.read().await.list_actions(filter))
    }

    async fn upsert_component_state(&self, state: ComponentState) -> Result<(), StoreError> {
        self.data.write().await.upsert_component_state(state)
    }

    async fn get_component_state(&self, component: &str) -> Result<Option<ComponentState>, StoreError> {
        Ok(self.data.read().await.get_component_state(component))
    }

    async fn list_component_states(&self) -> Result<Vec<ComponentState>, StoreError> {
        Ok(self.data.read().await.list_component_states())
    }
}
