//! Per-component install state.

use crate::{ActionClass, ActionId, ComponentStatus, CoreError, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest known install status of one deployable component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentState {
    /// Component name; the storage key.
    pub component: String,

    pub status: ComponentStatus,

    /// Name of the action that produced this state.
    #[serde(default)]
    pub last_action: Option<String>,

    /// Id of the action that produced this state.
    #[serde(default)]
    pub action_id: Option<ActionId>,

    pub updated_at: DateTime<Utc>,
}

impl ComponentState {
    /// State reported for a component that has never been acted on.
    pub fn not_installed(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: ComponentStatus::NotInstalled,
            last_action: None,
            action_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Check the fields a store needs to key the state.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.component.trim().is_empty() {
            return Err(CoreError::MissingField("component"));
        }
        Ok(())
    }
}

/// Status a component moves to while an action of this class is in flight.
pub fn in_flight_status(class: ActionClass) -> Option<ComponentStatus> {
    match class {
        ActionClass::Install => Some(ComponentStatus::Installing),
        ActionClass::Uninstall => Some(ComponentStatus::Uninstalling),
        ActionClass::Other => None,
    }
}

/// Status a component settles in once an action of this class finishes.
///
/// Anything short of success, cancellation included, leaves the component
/// `failed`: its real state is unknown.
pub fn settled_status(class: ActionClass, outcome: TaskStatus) -> Option<ComponentStatus> {
    match (class, outcome) {
        (ActionClass::Install, TaskStatus::Succeeded) => Some(ComponentStatus::Installed),
        (ActionClass::Uninstall, TaskStatus::Succeeded) => Some(ComponentStatus::NotInstalled),
        (ActionClass::Other, _) => None,
        _ => Some(ComponentStatus::Failed),
    }
}
