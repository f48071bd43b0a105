//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;
use std::sync::Arc;

use nfdeploy_core::{ComponentStatus, TaskFilter, TaskStatus};
use tracing::warn;

use crate::state::AppState;

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    collect_task_metrics(state, &mut output).await;
    collect_component_metrics(state, &mut output).await;

    output
}

/// Collect runner task metrics by status.
async fn collect_task_metrics(state: &Arc<AppState>, output: &mut String) {
    let tasks = state.runner().list(&TaskFilter::default()).await;

    // Count tasks by status
    let mut running = 0u64;
    let mut succeeded = 0u64;
    let mut failed = 0u64;
    let mut canceled = 0u64;

    for task in &tasks {
        match task.status {
            TaskStatus::Running => running += 1,
            TaskStatus::Succeeded => succeeded += 1,
            TaskStatus::Failed => failed += 1,
            TaskStatus::Canceled => canceled += 1,
        }
    }

    // Write Prometheus format
    writeln!(
        output,
        "# HELP nfdeploy_tasks_total Number of tasks known to the runner by status"
    )
    .ok();
    writeln!(output, "# TYPE nfdeploy_tasks_total gauge").ok();
    writeln!(output, "nfdeploy_tasks_total{{status=\"running\"}} {running}").ok();
    writeln!(
        output,
        "nfdeploy_tasks_total{{status=\"succeeded\"}} {succeeded}"
    )
    .ok();
    writeln!(output, "nfdeploy_tasks_total{{status=\"failed\"}} {failed}").ok();
    writeln!(
        output,
        "nfdeploy_tasks_total{{status=\"canceled\"}} {canceled}"
    )
    .ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP nfdeploy_concurrency_limit Maximum simultaneously running tasks (0 = unlimited)"
    )
    .ok();
    writeln!(output, "# TYPE nfdeploy_concurrency_limit gauge").ok();
    writeln!(
        output,
        "nfdeploy_concurrency_limit {}",
        state.runner().max_concurrent()
    )
    .ok();
}

/// Collect component counts by install status.
async fn collect_component_metrics(state: &Arc<AppState>, output: &mut String) {
    let components = match state.tracker.component_states().await {
        Ok(components) => components,
        Err(e) => {
            warn!(error = %e, "Failed to read component states for metrics");
            return;
        }
    };

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP nfdeploy_components Number of components by install status"
    )
    .ok();
    writeln!(output, "# TYPE nfdeploy_components gauge").ok();
    for status in ComponentStatus::all() {
        let count = components.iter().filter(|c| c.status == *status).count();
        writeln!(
            output,
            "nfdeploy_components{{status=\"{}\"}} {count}",
            status.as_str()
        )
        .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::runner::Runner;
    use crate::store::MemoryStore;
    use crate::tracker::{ActionTracker, Toolchain};

    #[tokio::test]
    async fn test_collect_metrics_empty_state() {
        let state = AppState::new(ActionTracker::new(
            Runner::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(Registry::builtin()),
            Toolchain::new("true"),
        ));
        let output = collect_metrics(&state).await;

        // Should contain task metrics
        assert!(output.contains("nfdeploy_tasks_total"));
        assert!(output.contains("nfdeploy_tasks_total{status=\"running\"} 0"));
        assert!(output.contains("nfdeploy_concurrency_limit 1"));

        // Every registered component starts out not installed
        assert!(output.contains("nfdeploy_components{status=\"not_installed\"} 8"));
        assert!(output.contains("nfdeploy_components{status=\"installed\"} 0"));
    }
}
