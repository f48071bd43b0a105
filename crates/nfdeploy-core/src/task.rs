//! Task specification and snapshot types.

use crate::{TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// What to execute. Immutable once submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Program name (looked up on `PATH`) or explicit path.
    pub command: String,

    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory; inherits the server's when unset.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Extra environment variables layered over the inherited environment.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Free-form labels used for filtering and correlation.
    #[serde(default)]
    pub labels: HashMap<String, String>,

    /// Human readable description.
    #[serde(default)]
    pub description: String,
}

impl TaskSpec {
    /// Create a spec for the given program.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Builder method to append an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Builder method to append several arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
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

    /// Builder method to add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Immutable snapshot of a task, without its output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    /// Unique task identifier.
    pub id: TaskId,

    /// What was submitted.
    pub spec: TaskSpec,

    /// Current status.
    pub status: TaskStatus,

    /// When the task was submitted.
    pub created_at: DateTime<Utc>,

    /// When execution started.
    pub started_at: DateTime<Utc>,

    /// Set together with the terminal status.
    pub finished_at: Option<DateTime<Utc>>,

    /// Process exit code; `-1` for canceled tasks and exec failures.
    pub exit_code: Option<i32>,

    /// Failure description for non-successful tasks.
    pub error: Option<String>,
}

impl TaskView {
    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Look up a label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.spec.labels.get(key).map(String::as_str)
    }
}

/// Narrows a task listing. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Exact status match.
    #[serde(default)]
    pub status: Option<TaskStatus>,

    /// Every given key must be present with exactly this value.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl TaskFilter {
    /// Builder method to require a status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Builder method to require a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Check whether a task matches this filter.
    pub fn matches(&self, task: &TaskView) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        self.labels
            .iter()
            .all(|(k, v)| task.spec.labels.get(k) == Some(v))
    }
}

/// Bytes read from a task's output starting at some offset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    /// Bytes written since the requested offset.
    pub data: Vec<u8>,

    /// Offset to pass on the next read to resume after `data`.
    pub new_offset: usize,
}

impl OutputChunk {
    /// Output decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Drop a trailing, unfinished UTF-8 sequence and rewind `new_offset`
    /// over it, so the next read returns the whole character.
    ///
    /// Only meaningful while more output can still arrive.
    pub fn hold_partial_char(mut self) -> Self {
        let keep = complete_utf8_len(&self.data);
        let held = self.data.len() - keep;
        self.data.truncate(keep);
        self.new_offset -= held;
        self
    }
}

/// Length of `data` without a trailing, incomplete UTF-8 sequence.
///
/// Invalid bytes are left in place for lossy decoding.
fn complete_utf8_len(data: &[u8]) -> usize {
    for back in 1..=data.len().min(3) {
        let i = data.len() - back;
        let byte = data[i];
        if byte & 0xC0 == 0x80 {
            // continuation
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { i } else { data.len() };
    }
    data.len()
}
