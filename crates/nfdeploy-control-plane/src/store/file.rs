//! JSON-file backed store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use nfdeploy_core::{ActionFilter, ActionId, ActionRecord, ActionResult, ComponentState};

use super::data::StoreData;
use super::{Store, StoreError};

/// Store that persists to a single JSON document.
///
/// Every mutation is applied to a copy, written to `<path>.tmp` and renamed
/// over the original; the in-memory copy only changes once the rename
/// succeeded, so a failed write leaves both views unchanged.
///
/// Each write clones the whole history and rewrites the whole document, and
/// nothing is ever pruned, so write cost grows linearly with the number of
/// recorded actions. Suitable for low action volumes only.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl FileStore {
    /// Open the store at `path`, creating an empty one if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => StoreData::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), "Opened state file");
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    async fn mutate<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoreData) -> Result<(), StoreError>,
    {
        let mut guard = self.data.lock().await;
        let mut next = guard.clone();
        apply(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(())
    }

    async fn persist(&self, data: &StoreData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(data)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "State file written");
        Ok(())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn insert_action(&self, record: ActionRecord) -> Result<(), StoreError> {
        self.mutate(|data| data.insert_action(record)).await
    }

    async fn update_action_result(&self, id: &ActionId, result: ActionResult) -> Result<(), StoreError> {
        self.mutate(|data| data.update_action_result(id, result)).await
    }

    async fn get_action(&self, id: &ActionId) -> Result<Option<ActionRecord>, StoreError> {
        Ok(self.data.lock().await.get_action(id))
    }

    async fn list_actions(&self, filter: &ActionFilter) -> Result<Vec<ActionRecord>, StoreError> {
        Ok(self.data.lock().await.list_actions(filter))
    }

    async fn upsert_component_state(&self, state: ComponentState) -> Result<(), StoreError> {
        self.mutate(|data| data.upsert_component_state(state)).await
    }

    async fn get_component_state(&self, component: &str) -> Result<Option<ComponentState>, StoreError> {
        Ok(self.data.lock().await.get_component_state(component))
    }

    async fn list_component_states(&self) -> Result<Vec<ComponentState>, StoreError> {
        Ok(self.data.lock().await.list_component_states())
    }
}
