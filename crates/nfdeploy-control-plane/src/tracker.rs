//! Action tracking on top of the runner.
//!
//! Every component action becomes one runner task plus one durable
//! [`ActionRecord`]. Install- and uninstall-class actions additionally drive
//! the component's [`ComponentState`]: optimistically when submitted, and
//! definitively from the task's completion hook.
//!
//! Storage failures after submission are logged and swallowed. The task is
//! already running by then and its outcome is still visible through the
//! runner.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use nfdeploy_core::component::{in_flight_status, settled_status};
use nfdeploy_core::{
    ActionClass, ActionId, ActionRecord, ActionResult, ActionView, ComponentState, ComponentStatus,
    TaskSpec, TaskStatus, TaskView,
};

use crate::registry::{Registry, RegistryError};
use crate::runner::{CompletionHook, Runner, RunnerError};
use crate::store::{Store, StoreError};

/// Task label keys set on every action task.
pub mod labels {
    pub const COMPONENT: &str = "component";
    pub const ACTION: &str = "action";
    pub const TARGET: &str = "target";
    pub const ACTION_ID: &str = "action_id";
}

/// Tracker errors.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The runner's concurrency gate is saturated; retry later.
    #[error("Another operation is in progress (limit {limit}); retry later")]
    Busy { limit: usize },

    #[error("Failed to submit action: {0}")]
    Submit(RunnerError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<RunnerError> for TrackerError {
    fn from(e: RunnerError) -> Self {
        match e {
            RunnerError::ConcurrencyLimit { limit } => Self::Busy { limit },
            other => Self::Submit(other),
        }
    }
}

/// How a registry target becomes a command line.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Program to run, e.g. `make`.
    pub command: String,

    /// Arguments placed before the target.
    pub args: Vec<String>,

    /// Directory the toolchain runs in.
    pub work_dir: Option<PathBuf>,

    /// Environment passed to every action.
    pub env: HashMap<String, String>,
}

impl Toolchain {
    /// Run targets with `command` and no extra arguments.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            work_dir: None,
            env: HashMap::new(),
        }
    }

    /// Builder method to set the working directory.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Builder method to add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn spec_for(&self, target: &str) -> TaskSpec {
        let mut spec = TaskSpec::new(&self.command)
            .with_args(self.args.iter().cloned())
            .with_arg(target);
        spec.work_dir = self.work_dir.clone();
        spec.env = self.env.clone();
        spec
    }
}

/// Caller-supplied metadata for an action.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// Executes component actions and keeps their durable record in step.
pub struct ActionTracker {
    runner: Runner,
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
    toolchain: Toolchain,
}

impl ActionTracker {
    pub fn new(
        runner: Runner,
        store: Arc<dyn Store>,
        registry: Arc<Registry>,
        toolchain: Toolchain,
    ) -> Self {
        Self {
            runner,
            store,
            registry,
            toolchain,
        }
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Start `action` on `component` and return as soon as it is running.
    pub async fn execute_action(
        &self,
        component: &str,
        action: &str,
        request: ActionRequest,
    ) -> Result<ActionView, TrackerError> {
        let target = self.registry.resolve(component, action)?.to_string();
        let class = ActionClass::of(action);
        let action_id = ActionId::generate();

        let mut spec = self
            .toolchain
            .spec_for(&target)
            .with_description(format!("{action} {component}"));
        spec.labels = request.labels.clone();
        spec.labels.insert(labels::COMPONENT.into(), component.into());
        spec.labels.insert(labels::ACTION.into(), action.into());
        spec.labels.insert(labels::TARGET.into(), target.clone());
        spec.labels.insert(labels::ACTION_ID.into(), action_id.to_string());

        // The hook must not update the record before it has been inserted.
        let (recorded_tx, recorded_rx) = oneshot::channel();
        let hook: Arc<dyn CompletionHook> = Arc::new(ActionCompletion {
            store: self.store.clone(),
            action_id: action_id.clone(),
            component: component.to_string(),
            action: action.to_string(),
            class,
            recorded: Mutex::new(Some(recorded_rx)),
        });

        let task = self.runner.submit(spec, Some(hook)).await?;

        let mut record = ActionRecord::new(component, action, &target)
            .with_task(task.id.clone())
            .with_labels(request.labels)
            .with_tags(request.tags);
        record.id = action_id.clone();
        record.started_at = task.started_at;

        if let Err(e) = self.store.insert_action(record).await {
            error!(
                action_id = %action_id,
                task_id = %task.id,
                error = %e,
                "Failed to record action; execution continues"
            );
        }

        if let Some(status) = in_flight_status(class) {
            upsert_component(&self.store, component, status, action, &action_id, task.started_at)
                .await;
        }

        let _ = recorded_tx.send(());

        info!(
            action_id = %action_id,
            task_id = %task.id,
            component = %component,
            action = %action,
            target = %target,
            "Action started"
        );

        Ok(ActionView {
            action_id,
            task_id: task.id,
            component: component.to_string(),
            action: action.to_string(),
            target,
            status: task.status,
            started_at: task.started_at,
        })
    }

    /// Current state of one registered component.
    ///
    /// Components that were never acted on report `not_installed`.
    pub async fn component_state(&self, component: &str) -> Result<ComponentState, TrackerError> {
        if !self.registry.contains(component) {
            return Err(RegistryError::UnknownComponent(component.to_string()).into());
        }
        Ok(self
            .store
            .get_component_state(component)
            .await?
            .unwrap_or_else(|| ComponentState::not_installed(component)))
    }

    /// States of every registered component, plus any persisted ones no longer registered.
    pub async fn component_states(&self) -> Result<Vec<ComponentState>, TrackerError> {
        let mut persisted: HashMap<String, ComponentState> = self
            .store
            .list_component_states()
            .await?
            .into_iter()
            .map(|s| (s.component.clone(), s))
            .collect();

        let mut states: Vec<ComponentState> = self
            .registry
            .components()
            .map(|name| {
                persisted
                    .remove(name)
                    .unwrap_or_else(|| ComponentState::not_installed(name))
            })
            .collect();
        states.extend(persisted.into_values());
        states.sort_by(|a, b| a.component.cmp(&b.component));
        Ok(states)
    }
}

async fn upsert_component(
    store: &Arc<dyn Store>,
    component: &str,
    status: ComponentStatus,
    action: &str,
    action_id: &ActionId,
    at: DateTime<Utc>,
) {
    let state = ComponentState {
        component: component.to_string(),
        status,
        last_action: Some(action.to_string()),
        action_id: Some(action_id.clone()),
        updated_at: at,
    };
    if let Err(e) = store.upsert_component_state(state).await {
        error!(
            component = %component,
            status = %status,
            action_id = %action_id,
            error = %e,
            "Failed to record component state"
        );
    }
}

/// Completion hook attached to every action task.
struct ActionCompletion {
    store: Arc<dyn Store>,
    action_id: ActionId,
    component: String,
    action: String,
    class: ActionClass,
    recorded: Mutex<Option<oneshot::Receiver<()>>>,
}

#[async_trait]
impl CompletionHook for ActionCompletion {
    async fn on_complete(&self, task: TaskView) {
        let recorded = self
            .recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(recorded) = recorded {
            // An error only means the submitter went away; proceed regardless.
            let _ = recorded.await;
        }

        let result = ActionResult::from_task(&task);
        let finished_at = result.finished_at;

        if let Err(e) = self.store.update_action_result(&self.action_id, result).await {
            error!(
                action_id = %self.action_id,
                task_id = %task.id,
                error = %e,
                "Failed to record action result"
            );
        }

        if let Some(status) = settled_status(self.class, task.status) {
            upsert_component(
                &self.store,
                &self.component,
                status,
                &self.action,
                &self.action_id,
                finished_at,
            )
            .await;
        }

        if task.status != TaskStatus::Succeeded {
            warn!(
                action_id = %self.action_id,
                component = %self.component,
                action = %self.action,
                status = %task.status,
                exit_code = ?task.exit_code,
                "Action did not succeed"
            );
        } else {
            info!(
                action_id = %self.action_id,
                component = %self.component,
                action = %self.action,
                "Action succeeded"
            );
        }
    }
}
