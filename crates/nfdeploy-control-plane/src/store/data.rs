//! Store contents and the rules every implementation applies to them.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use nfdeploy_core::{ActionFilter, ActionId, ActionRecord, ActionResult, ComponentState};

use super::StoreError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreData {
    #[serde(default)]
    actions: HashMap<String, ActionRecord>,

    #[serde(default)]
    components: BTreeMap<String, ComponentState>,
}

impl StoreData {
    pub(crate) fn insert_action(&mut self, record: ActionRecord) -> Result<(), StoreError> {
        record.validate()?;
        if self.actions.contains_key(record.id.as_str()) {
            return Err(StoreError::DuplicateAction(record.id));
        }
        self.actions.insert(record.id.as_str().to_string(), record);
        Ok(())
    }

    pub(crate) fn update_action_result(
        &mut self,
        id: &ActionId,
        result: ActionResult,
    ) -> Result<(), StoreError> {
        let record = self
            .actions
            .get_mut(id.as_str())
            .ok_or_else(|| StoreError::ActionNotFound(id.clone()))?;
        record.apply(result);
        Ok(())
    }

    pub(crate) fn get_action(&self, id: &ActionId) -> Option<ActionRecord> {
        self.actions.get(id.as_str()).cloned()
    }

    pub(crate) fn list_actions(&self, filter: &ActionFilter) -> Vec<ActionRecord> {
        let mut matched: Vec<&ActionRecord> =
            self.actions.values().filter(|r| filter.matches(r)).collect();
        matched.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.page_size())
            .cloned()
            .collect()
    }

    pub(crate) fn upsert_component_state(&mut self, state: ComponentState) -> Result<(), StoreError> {
        state.validate()?;
        self.components.insert(state.component.clone(), state);
        Ok(())
    }

    pub(crate) fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.components.get(component).cloned()
    }

    pub(crate) fn list_component_states(&self) -> Vec<ComponentState> {
        self.components.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use nfdeploy_core::{ComponentStatus, TaskStatus};

    fn record_at(component: &str, action: &str, minutes_ago: i64) -> ActionRecord {
        let mut record = ActionRecord::new(component, action, format!("{component}-{action}"));
        record.started_at = Utc::now() - Duration::minutes(minutes_ago);
        record
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let mut data = StoreData::default();
        let record = record_at("k8s", "install", 0)
            .with_labels(HashMap::from([("operator".to_string(), "alice".to_string())]))
            .with_tags(vec!["lab".to_string()]);
        data.insert_action(record.clone()).unwrap();

        let loaded = data.get_action(&record.id).unwrap();
        assert_eq!(loaded.component, "k8s");
        assert_eq!(loaded.action, "install");
        assert_eq!(loaded.target, "k8s-install");
        assert_eq!(loaded.labels, record.labels);
        assert_eq!(loaded.tags, record.tags);
        assert_eq!(loaded.started_at, record.started_at);
    }

    #[test]
    fn test_insert_rejects_incomplete_and_duplicate() {
        let mut data = StoreData::default();
        let mut bad = record_at("k8s", "install", 0);
        bad.component = String::new();
        assert!(matches!(data.insert_action(bad), Err(StoreError::InvalidRecord(_))));

        let record = record_at("k8s", "install", 0);
        data.insert_action(record.clone()).unwrap();
        assert!(matches!(
            data.insert_action(record),
            Err(StoreError::DuplicateAction(_))
        ));
    }

    #[test]
    fn test_update_unknown_action() {
        let mut data = StoreData::default();
        let result = ActionResult {
            status: TaskStatus::Succeeded,
            exit_code: Some(0),
            error: None,
            finished_at: Utc::now(),
        };
        assert!(matches!(
            data.update_action_result(&ActionId::new("nope"), result),
            Err(StoreError::ActionNotFound(_))
        ));
    }

    #[test]
    fn test_list_filters_orders_and_pages() {
        let mut data = StoreData::default();
        for i in 0..60 {
            data.insert_action(record_at("5gc", "install", i)).unwrap();
        }
        let k8s = record_at("k8s", "uninstall", 100);
        data.insert_action(k8s.clone()).unwrap();

        let page = data.list_actions(&ActionFilter::default());
        assert_eq!(page.len(), 50);
        assert!(page.windows(2).all(|w| w[0].started_at >= w[1].started_at));

        let rest = data.list_actions(&ActionFilter {
            offset: 50,
            ..Default::default()
        });
        assert_eq!(rest.len(), 11);
        assert_eq!(rest.last().unwrap().id, k8s.id);

        let only_k8s = data.list_actions(&ActionFilter::default().with_component("k8s"));
        assert_eq!(only_k8s.len(), 1);

        let running = data.list_actions(
            &ActionFilter::default()
                .with_action("install")
                .with_status(TaskStatus::Running),
        );
        assert_eq!(running.len(), 50);
    }

    #[test]
    fn test_component_upsert_replaces() {
        let mut data = StoreData::default();
        let mut state = ComponentState::not_installed("k8s");
        state.status = ComponentStatus::Installing;
        data.upsert_component_state(state.clone()).unwrap();
        state.status = ComponentStatus::Installed;
        data.upsert_component_state(state).unwrap();

        let states = data.list_component_states();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].status, ComponentStatus::Installed);

        assert!(data
            .upsert_component_state(ComponentState::not_installed(" "))
            .is_err());
    }
}
