//! Shared application state.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::registry::Registry;
use crate::runner::Runner;
use crate::store::{FileStore, MemoryStore, Store, StoreError};
use crate::tracker::ActionTracker;

/// Shared application state.
pub struct AppState {
    /// Component action execution and history.
    pub tracker: ActionTracker,
}

impl AppState {
    /// Build state from configuration, opening the configured store.
    pub async fn from_config(config: &Config) -> Result<Arc<Self>, StoreError> {
        let store: Arc<dyn Store> = match &config.store_path {
            Some(path) => Arc::new(FileStore::open(path).await?),
            None => {
                info!("No state file configured; action history is kept in memory only");
                Arc::new(MemoryStore::new())
            }
        };
        let runner = Runner::new(config.runner_config());
        let registry = Arc::new(Registry::builtin());
        Ok(Self::new(ActionTracker::new(
            runner,
            store,
            registry,
            config.toolchain(),
        )))
    }

    /// Create a new AppState wrapped in Arc.
    pub fn new(tracker: ActionTracker) -> Arc<Self> {
        Arc::new(Self { tracker })
    }

    pub fn runner(&self) -> &Runner {
        self.tracker.runner()
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        self.tracker.store()
    }
}
