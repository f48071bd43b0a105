//! Static mapping of component actions to toolchain targets.

use std::collections::BTreeMap;

use thiserror::Error;

/// Registry lookup errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("Unknown action '{action}' for component '{component}'")]
    UnknownAction { component: String, action: String },
}

/// Read-only `(component, action) -> target` table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    components: BTreeMap<String, BTreeMap<String, String>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The deployment components and their OnRamp make targets.
    pub fn builtin() -> Self {
        Self::new()
            .with_target("k8s", "install", "aether-k8s-install")
            .with_target("k8s", "uninstall", "aether-k8s-uninstall")
            .with_target("5gc", "install", "aether-5gc-install")
            .with_target("5gc", "uninstall", "aether-5gc-uninstall")
            .with_target("5gc", "reset", "aether-5gc-reset")
            .with_target("gnbsim", "install", "aether-gnbsim-install")
            .with_target("gnbsim", "uninstall", "aether-gnbsim-uninstall")
            .with_target("gnbsim", "run", "aether-gnbsim-run")
            .with_target("ueransim", "install", "aether-ueransim-install")
            .with_target("ueransim", "uninstall", "aether-ueransim-uninstall")
            .with_target("ueransim", "run", "aether-ueransim-run")
            .with_target("ueransim", "stop", "aether-ueransim-stop")
            .with_target("oai", "gnb-install", "aether-oai-gnb-install")
            .with_target("oai", "gnb-uninstall", "aether-oai-gnb-uninstall")
            .with_target("oai", "uesim-start", "aether-oai-uesim-start")
            .with_target("oai", "uesim-stop", "aether-oai-uesim-stop")
            .with_target("srsran", "gnb-install", "aether-srsran-gnb-install")
            .with_target("srsran", "gnb-uninstall", "aether-srsran-gnb-uninstall")
            .with_target("srsran", "uesim-start", "aether-srsran-uesim-start")
            .with_target("srsran", "uesim-stop", "aether-srsran-uesim-stop")
            .with_target("amp", "install", "aether-amp-install")
            .with_target("amp", "uninstall", "aether-amp-uninstall")
            .with_target("cluster", "pingall", "aether-pingall")
    }

    /// Builder method to register a target.
    pub fn with_target(
        mut self,
        component: impl Into<String>,
        action: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.components
            .entry(component.into())
            .or_default()
            .insert(action.into(), target.into());
        self
    }

    /// Resolve a component action to its target.
    pub fn resolve(&self, component: &str, action: &str) -> Result<&str, RegistryError> {
        let actions = self
            .components
            .get(component)
            .ok_or_else(|| RegistryError::UnknownComponent(component.to_string()))?;
        actions
            .get(action)
            .map(String::as_str)
            .ok_or_else(|| RegistryError::UnknownAction {
                component: component.to_string(),
                action: action.to_string(),
            })
    }

    /// Check whether a component is registered.
    pub fn contains(&self, component: &str) -> bool {
        self.components.contains_key(component)
    }

    /// Registered component names, sorted.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Action names for one component, sorted.
    pub fn actions(&self, component: &str) -> Option<Vec<&str>> {
        self.components
            .get(component)
            .map(|actions| actions.keys().map(String::as_str).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_builtin() {
        let registry = Registry::builtin();
        assert_eq!(registry.resolve("k8s", "install").unwrap(), "aether-k8s-install");
        assert_eq!(registry.resolve("cluster", "pingall").unwrap(), "aether-pingall");
    }

    #[test]
    fn test_unknown_names() {
        let registry = Registry::builtin();
        assert_eq!(
            registry.resolve("ims", "install"),
            Err(RegistryError::UnknownComponent("ims".to_string()))
        );
        assert_eq!(
            registry.resolve("k8s", "pingall"),
            Err(RegistryError::UnknownAction {
                component: "k8s".to_string(),
                action: "pingall".to_string(),
            })
        );
    }

    #[test]
    fn test_listing() {
        let registry = Registry::builtin();
        assert!(registry.contains("5gc"));
        assert!(!registry.contains("ims"));
        assert_eq!(
            registry.actions("5gc").unwrap(),
            vec!["install", "reset", "uninstall"]
        );
        assert_eq!(registry.components().next(), Some("5gc"));
    }
}
