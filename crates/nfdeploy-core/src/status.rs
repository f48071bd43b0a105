//! Status enums for Tasks, Actions, and Components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Status of a Task in the runner.
///
/// `Running` is the only non-terminal state. Each terminal state is reached
/// from `Running` exactly once and never left again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Subprocess started (or is about to) and has not exited.
    #[default]
    Running,
    /// Subprocess exited with status zero.
    Succeeded,
    /// Subprocess exited non-zero or could not be executed.
    Failed,
    /// Execution was canceled before the subprocess finished.
    Canceled,
}

impl TaskStatus {
    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            other => Err(CoreError::InvalidInput(format!("unknown status '{other}'"))),
        }
    }
}

/// Install status of a deployable component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// No completed install, or the last uninstall succeeded.
    #[default]
    NotInstalled,
    /// An install action is in flight.
    Installing,
    /// The last install action succeeded.
    Installed,
    /// An uninstall action is in flight.
    Uninstalling,
    /// The last install or uninstall action did not succeed.
    Failed,
}

impl ComponentStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInstalled => "not_installed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Uninstalling => "uninstalling",
            Self::Failed => "failed",
        }
    }

    /// All statuses, in lifecycle order.
    pub fn all() -> &'static [ComponentStatus] {
        &[
            Self::NotInstalled,
            Self::Installing,
            Self::Installed,
            Self::Uninstalling,
            Self::Failed,
        ]
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
