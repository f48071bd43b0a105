//! Durable action history types.

use crate::{ActionId, CoreError, TaskId, TaskStatus, TaskView};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Page size used when an action listing does not specify a limit.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Whether an action affects a component's install state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionClass {
    /// `install` or any `*-install` action.
    Install,
    /// `uninstall` or any `*-uninstall` action.
    Uninstall,
    /// Everything else; never touches component state.
    Other,
}

impl ActionClass {
    /// Classify an action by name.
    pub fn of(action: &str) -> Self {
        if action == "uninstall" || action.ends_with("-uninstall") {
            Self::Uninstall
        } else if action == "install" || action.ends_with("-install") {
            Self::Install
        } else {
            Self::Other
        }
    }

    /// True for install- and uninstall-class actions.
    pub fn affects_component(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// One persisted execution of a component action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Durable identifier, independent of the runner's task id.
    pub id: ActionId,

    /// Component the action was run against.
    pub component: String,

    /// Action name, e.g. `install`.
    pub action: String,

    /// Toolchain target the action resolved to.
    pub target: String,

    /// Task that carried out the action (meaningful only while the process lives).
    #[serde(default)]
    pub task_id: Option<TaskId>,

    /// Mirrors the task status but outlives it.
    pub status: TaskStatus,

    /// Exit code, set on completion.
    #[serde(default)]
    pub exit_code: Option<i32>,

    /// Failure description, set on completion.
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub tags: Vec<String>,

    pub started_at: DateTime<Utc>,

    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ActionRecord {
    /// Create a running record with a freshly generated id.
    pub fn new(
        component: impl Into<String>,
        action: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: ActionId::generate(),
            component: component.into(),
            action: action.into(),
            target: target.into(),
            task_id: None,
            status: TaskStatus::Running,
            exit_code: None,
            error: None,
            labels: HashMap::new(),
            tags: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Builder method to set the correlated task.
    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Builder method to set labels.
    pub fn with_labels(mut self, labels: HashMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// Builder method to set tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Check the fields a store needs to key and describe the record.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.is_empty() {
            return Err(CoreError::MissingField("id"));
        }
        if self.component.trim().is_empty() {
            return Err(CoreError::MissingField("component"));
        }
        if self.action.trim().is_empty() {
            return Err(CoreError::MissingField("action"));
        }
        if self.target.trim().is_empty() {
            return Err(CoreError::MissingField("target"));
        }
        Ok(())
    }

    /// Apply a completion result.
    pub fn apply(&mut self, result: ActionResult) {
        self.status = result.status;
        self.exit_code = result.exit_code;
        self.error = result.error;
        self.finished_at = Some(result.finished_at);
    }
}

/// Terminal outcome written to an action record on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub status: TaskStatus,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl ActionResult {
    /// Derive the result from a finished task.
    pub fn from_task(task: &TaskView) -> Self {
        Self {
            status: task.status,
            exit_code: task.exit_code,
            error: task.error.clone(),
            finished_at: task.finished_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Narrows an action listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionFilter {
    #[serde(default)]
    pub component: Option<String>,

    #[serde(default)]
    pub action: Option<String>,

    #[serde(default)]
    pub status: Option<TaskStatus>,

    /// Number of matching records to skip.
    #[serde(default)]
    pub offset: usize,

    /// Maximum records to return; zero or unset means [`DEFAULT_PAGE_SIZE`].
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ActionFilter {
    /// Builder method to require a component.
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Builder method to require an action name.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Builder method to require a status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Effective page size.
    pub fn page_size(&self) -> usize {
        match self.limit {
            Some(limit) if limit > 0 => limit,
            _ => DEFAULT_PAGE_SIZE,
        }
    }

    /// Check whether a record matches the exact-match criteria.
    pub fn matches(&self, record: &ActionRecord) -> bool {
        self.component.as_ref().map_or(true, |c| *c == record.component)
            && self.action.as_ref().map_or(true, |a| *a == record.action)
            && self.status.map_or(true, |s| s == record.status)
    }
}

/// What a caller gets back from executing an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionView {
    pub action_id: ActionId,
    pub task_id: TaskId,
    pub component: String,
    pub action: String,
    pub target: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
}
