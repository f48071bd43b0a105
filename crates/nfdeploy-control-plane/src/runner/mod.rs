//! In-memory asynchronous command runner.
//!
//! The runner owns the task table, enforces the concurrency gate, spawns one
//! execution task per submission and exposes snapshot reads. Nothing in its
//! API waits for a subprocess to finish: callers poll `get`/`output`, or
//! attach a [`CompletionHook`] at submission.

mod exec;
mod output;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use nfdeploy_core::{OutputChunk, TaskFilter, TaskId, TaskSpec, TaskStatus, TaskView};

pub use exec::{resolve_command, NO_EXIT_CODE};
pub use output::OutputBuffer;

use exec::Execution;

/// Runner errors. All of them are returned before any execution starts.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Concurrency limit reached: {limit} task(s) already running")]
    ConcurrencyLimit { limit: usize },

    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Task is not running: {0}")]
    NotRunning(TaskId),
}

/// Called exactly once with the final snapshot after a task turns terminal.
///
/// Runs outside the runner's locks. A panic inside the hook is contained and
/// logged; it never affects the recorded task state.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    async fn on_complete(&self, task: TaskView);
}

/// Runner tuning.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum simultaneously running tasks; zero disables the gate.
    pub max_concurrent: usize,

    /// How long a canceled process gets to exit after SIGTERM before it is killed.
    pub cancel_grace: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            cancel_grace: Duration::from_secs(10),
        }
    }
}

struct TaskEntry {
    /// Submission order; breaks ties between equal timestamps.
    seq: u64,
    view: TaskView,
    output: Arc<OutputBuffer>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct TaskTable {
    next_seq: u64,
    entries: HashMap<TaskId, TaskEntry>,
}

impl TaskTable {
    fn running_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.view.status == TaskStatus::Running)
            .count()
    }
}

/// Command runner. Cheap to clone; clones share the same task table.
#[derive(Clone)]
pub struct Runner {
    tasks: Arc<RwLock<TaskTable>>,
    config: Arc<RunnerConfig>,
}

impl Runner {
    /// Create a runner with the given configuration.
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(TaskTable::default())),
            config: Arc::new(config),
        }
    }

    /// Configured concurrency limit (zero means unlimited).
    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent
    }

    /// Start executing `spec` and return its initial snapshot immediately.
    pub async fn submit(
        &self,
        spec: TaskSpec,
        hook: Option<Arc<dyn CompletionHook>>,
    ) -> Result<TaskView, RunnerError> {
        let program = resolve_command(&spec.command)
            .ok_or_else(|| RunnerError::CommandNotFound(spec.command.clone()))?;

        let mut table = self.tasks.write().await;

        let limit = self.config.max_concurrent;
        if limit > 0 && table.running_count() >= limit {
            warn!(
                command = %spec.command,
                limit,
                "Rejecting submission: concurrency limit reached"
            );
            return Err(RunnerError::ConcurrencyLimit { limit });
        }

        let now = Utc::now();
        let id = TaskId::generate();
        let view = TaskView {
            id: id.clone(),
            spec: spec.clone(),
            status: TaskStatus::Running,
            created_at: now,
            started_at: now,
            finished_at: None,
            exit_code: None,
            error: None,
        };
        let output = Arc::new(OutputBuffer::new());
        let cancel = CancellationToken::new();

        let seq = table.next_seq;
        table.next_seq += 1;
        table.entries.insert(
            id.clone(),
            TaskEntry {
                seq,
                view: view.clone(),
                output: output.clone(),
                cancel: cancel.clone(),
            },
        );

        let execution = Execution {
            id: id.clone(),
            program,
            spec,
            output,
            cancel,
            cancel_grace: self.config.cancel_grace,
        };
        tokio::spawn(self.clone().supervise(execution, hook));

        info!(
            task_id = %id,
            command = %view.spec.command,
            description = %view.spec.description,
            "Task submitted"
        );

        Ok(view)
    }

    /// Snapshot of one task.
    pub async fn get(&self, id: &TaskId) -> Result<TaskView, RunnerError> {
        let table = self.tasks.read().await;
        table
            .entries
            .get(id)
            .map(|e| e.view.clone())
            .ok_or_else(|| RunnerError::NotFound(id.clone()))
    }

    /// Snapshots of all matching tasks, most recently created first.
    pub async fn list(&self, filter: &TaskFilter) -> Vec<TaskView> {
        let table = self.tasks.read().await;
        let mut matched: Vec<(u64, TaskView)> = table
            .entries
            .values()
            .filter(|e| filter.matches(&e.view))
            .map(|e| (e.seq, e.view.clone()))
            .collect();
        matched.sort_by(|a, b| b.0.cmp(&a.0));
        matched.into_iter().map(|(_, view)| view).collect()
    }

    /// Output written since `offset`.
    pub async fn output(&self, id: &TaskId, offset: usize) -> Result<OutputChunk, RunnerError> {
        let buffer = {
            let table = self.tasks.read().await;
            table
                .entries
                .get(id)
                .map(|e| e.output.clone())
                .ok_or_else(|| RunnerError::NotFound(id.clone()))?
        };
        Ok(buffer.read_from(offset))
    }

    /// Request cancellation. The task turns `canceled` once its process exits.
    pub async fn cancel(&self, id: &TaskId) -> Result<(), RunnerError> {
        let table = self.tasks.read().await;
        let entry = table
            .entries
            .get(id)
            .ok_or_else(|| RunnerError::NotFound(id.clone()))?;
        if entry.view.status.is_terminal() {
            return Err(RunnerError::NotRunning(id.clone()));
        }
        entry.cancel.cancel();
        info!(task_id = %id, "Cancellation requested");
        Ok(())
    }

    /// Drive one execution to completion, commit its outcome, then run the hook.
    async fn supervise(self, execution: Execution, hook: Option<Arc<dyn CompletionHook>>) {
        let id = execution.id.clone();
        let outcome = execution.run().await;

        let view = {
            let mut table = self.tasks.write().await;
            let Some(entry) = table.entries.get_mut(&id) else {
                error!(task_id = %id, "Finished task missing from table");
                return;
            };
            let view = &mut entry.view;
            view.status = outcome.status;
            view.exit_code = Some(outcome.exit_code);
            view.error = outcome.error;
            view.finished_at = Some(Utc::now().max(view.started_at));
            view.clone()
        };

        info!(
            task_id = %id,
            status = %view.status,
            exit_code = ?view.exit_code,
            error = ?view.error,
            "Task finished"
        );

        if let Some(hook) = hook {
            let result = tokio::spawn(async move { hook.on_complete(view).await }).await;
            if let Err(e) = result {
                if e.is_panic() {
                    error!(task_id = %id, "Completion hook panicked");
                } else {
                    warn!(task_id = %id, error = %e, "Completion hook did not finish");
                }
            }
        }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn runner(max_concurrent: usize) -> Runner {
        Runner::new(RunnerConfig {
            max_concurrent,
            cancel_grace: Duration::from_secs(2),
        })
    }

    async fn wait_terminal(runner: &Runner, id: &TaskId) -> TaskView {
        for _ in 0..500 {
            let view = runner.get(id).await.unwrap();
            if view.is_terminal() {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("task {id} did not finish");
    }

    struct ChannelHook(mpsc::UnboundedSender<TaskView>);

    #[async_trait]
    impl CompletionHook for ChannelHook {
        async fn on_complete(&self, task: TaskView) {
            let _ = self.0.send(task);
        }
    }

    struct PanickingHook(Arc<AtomicUsize>);

    #[async_trait]
    impl CompletionHook for PanickingHook {
        async fn on_complete(&self, _task: TaskView) {
            self.0.fetch_add(1, Ordering::SeqCst);
            panic!("hook failure");
        }
    }

    #[tokio::test]
    async fn test_echo_succeeds_with_output() {
        let runner = runner(1);
        let view = runner
            .submit(TaskSpec::new("echo").with_args(["-n", "hi"]), None)
            .await
            .unwrap();
        assert_eq!(view.status, TaskStatus::Running);
        assert!(view.finished_at.is_none());

        let done = wait_terminal(&runner, &view.id).await;
        assert_eq!(done.status, TaskStatus::Succeeded);
        assert_eq!(done.exit_code, Some(0));
        assert!(done.error.is_none());
        assert!(done.started_at <= done.finished_at.unwrap());

        let chunk = runner.output(&view.id, 0).await.unwrap();
        assert_eq!(chunk.data, b"hi");
        assert_eq!(chunk.new_offset, 2);
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails() {
        let runner = runner(1);
        let view = runner
            .submit(TaskSpec::new("sh").with_args(["-c", "exit 42"]), None)
            .await
            .unwrap();
        let done = wait_terminal(&runner, &view.id).await;
        assert_eq!(done.status, TaskStatus::Failed);
        assert_eq!(done.exit_code, Some(42));
        assert!(done.error.is_some());
    }

    #[tokio::test]
    async fn test_command_not_found_creates_nothing() {
        let runner = runner(1);
        let err = runner
            .submit(TaskSpec::new("no-such-toolchain-binary"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::CommandNotFound(_)));
        assert!(runner.list(&TaskFilter::default()).await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_limit_then_cancel_frees_slot() {
        let runner = runner(1);
        let first = runner
            .submit(TaskSpec::new("sleep").with_arg("30"), None)
            .await
            .unwrap();

        let err = runner
            .submit(TaskSpec::new("echo").with_arg("second"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::ConcurrencyLimit { limit: 1 }));
        assert_eq!(runner.list(&TaskFilter::default()).await.len(), 1);

        runner.cancel(&first.id).await.unwrap();
        let done = wait_terminal(&runner, &first.id).await;
        assert_eq!(done.status, TaskStatus::Canceled);

        let third = runner
            .submit(TaskSpec::new("echo").with_arg("third"), None)
            .await
            .unwrap();
        assert_eq!(wait_terminal(&runner, &third.id).await.status, TaskStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_cancel_marks_canceled_then_not_running() {
        let runner = runner(1);
        let view = runner
            .submit(TaskSpec::new("sleep").with_arg("30"), None)
            .await
            .unwrap();
        runner.cancel(&view.id).await.unwrap();

        let done = wait_terminal(&runner, &view.id).await;
        assert_eq!(done.status, TaskStatus::Canceled);
        assert_eq!(done.exit_code, Some(NO_EXIT_CODE));
        assert_eq!(done.error.as_deref(), Some("canceled"));

        let err = runner.cancel(&view.id).await.unwrap_err();
        assert!(matches!(err, RunnerError::NotRunning(_)));
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let runner = runner(1);
        let id = TaskId::new("missing");
        assert!(matches!(runner.get(&id).await, Err(RunnerError::NotFound(_))));
        assert!(matches!(runner.output(&id, 0).await, Err(RunnerError::NotFound(_))));
        assert!(matches!(runner.cancel(&id).await, Err(RunnerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_terminal_state_is_stable() {
        let runner = runner(1);
        let view = runner.submit(TaskSpec::new("true"), None).await.unwrap();
        let first = wait_terminal(&runner, &view.id).await;
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let again = runner.get(&view.id).await.unwrap();
            assert_eq!(again.status, first.status);
            assert_eq!(again.exit_code, first.exit_code);
            assert_eq!(again.finished_at, first.finished_at);
        }
    }

    #[tokio::test]
    async fn test_stdout_and_stderr_share_buffer() {
        let runner = runner(1);
        let view = runner
            .submit(
                TaskSpec::new("sh").with_args(["-c", "echo out; sleep 0.1; echo err >&2"]),
                None,
            )
            .await
            .unwrap();
        wait_terminal(&runner, &view.id).await;
        let chunk = runner.output(&view.id, 0).await.unwrap();
        assert_eq!(chunk.text(), "out\nerr\n");

        let tail = runner.output(&view.id, 4).await.unwrap();
        assert_eq!(tail.text(), "err\n");
        let past = runner.output(&view.id, 1000).await.unwrap();
        assert!(past.data.is_empty());
        assert_eq!(past.new_offset, 8);
    }

    #[tokio::test]
    async fn test_incremental_reads_reconstruct_output() {
        let runner = runner(0);
        let view = runner
            .submit(
                TaskSpec::new("sh").with_args([
                    "-c",
                    "i=0; while [ $i -lt 200 ]; do echo line-$i; i=$((i+1)); done",
                ]),
                None,
            )
            .await
            .unwrap();

        let mut collected = Vec::new();
        let mut offset = 0;
        loop {
            let terminal = runner.get(&view.id).await.unwrap().is_terminal();
            let chunk = runner.output(&view.id, offset).await.unwrap();
            collected.extend_from_slice(&chunk.data);
            offset = chunk.new_offset;
            if terminal && chunk.data.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let expected: String = (0..200).map(|i| format!("line-{i}\n")).collect();
        assert_eq!(String::from_utf8(collected).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_spawn_failure_in_bad_work_dir() {
        let runner = runner(1);
        let view = runner
            .submit(TaskSpec::new("true").with_work_dir("/no/such/onramp/dir"), None)
            .await
            .unwrap();
        let done = wait_terminal(&runner, &view.id).await;
        assert_eq!(done.status, TaskStatus::Failed);
        assert_eq!(done.exit_code, Some(NO_EXIT_CODE));
        assert!(done.error.unwrap().contains("spawn"));
    }

    #[tokio::test]
    async fn test_env_and_labels_passed_through() {
        let runner = runner(1);
        let view = runner
            .submit(
                TaskSpec::new("sh")
                    .with_args(["-c", "printf %s \"$TARGET_NAME\""])
                    .with_env("TARGET_NAME", "k8s-install")
                    .with_label("component", "k8s"),
                None,
            )
            .await
            .unwrap();
        let done = wait_terminal(&runner, &view.id).await;
        assert_eq!(done.label("component"), Some("k8s"));
        assert_eq!(runner.output(&view.id, 0).await.unwrap().text(), "k8s-install");
    }

    #[tokio::test]
    async fn test_list_order_and_filter() {
        let runner = runner(0);
        let a = runner
            .submit(TaskSpec::new("true").with_label("component", "k8s"), None)
            .await
            .unwrap();
        let b = runner
            .submit(TaskSpec::new("false").with_label("component", "5gc"), None)
            .await
            .unwrap();
        let c = runner
            .submit(TaskSpec::new("true").with_label("component", "k8s"), None)
            .await
            .unwrap();
        for id in [&a.id, &b.id, &c.id] {
            wait_terminal(&runner, id).await;
        }

        let all: Vec<TaskId> = runner
            .list(&TaskFilter::default())
            .await
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(all, vec![c.id.clone(), b.id.clone(), a.id.clone()]);

        let k8s = runner
            .list(&TaskFilter::default().with_label("component", "k8s"))
            .await;
        assert_eq!(k8s.len(), 2);

        let failed = runner
            .list(&TaskFilter::default().with_status(TaskStatus::Failed))
            .await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, b.id);
    }

    #[tokio::test]
    async fn test_gate_never_exceeded() {
        let runner = runner(2);
        let mut accepted = Vec::new();
        let mut rejected = 0;
        for _ in 0..6 {
            match runner.submit(TaskSpec::new("sleep").with_arg("30"), None).await {
                Ok(view) => accepted.push(view.id),
                Err(RunnerError::ConcurrencyLimit { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
            let running = runner
                .list(&TaskFilter::default().with_status(TaskStatus::Running))
                .await
                .len();
            assert!(running <= 2);
        }
        assert_eq!(accepted.len(), 2);
        assert_eq!(rejected, 4);

        for id in &accepted {
            runner.cancel(id).await.unwrap();
        }
        for id in &accepted {
            wait_terminal(&runner, id).await;
        }
    }

    #[tokio::test]
    async fn test_hook_receives_final_view_once() {
        let runner = runner(1);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let view = runner
            .submit(
                TaskSpec::new("sh").with_args(["-c", "exit 3"]),
                Some(Arc::new(ChannelHook(tx))),
            )
            .await
            .unwrap();

        let finished = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(finished.id, view.id);
        assert_eq!(finished.status, TaskStatus::Failed);
        assert_eq!(finished.exit_code, Some(3));
        assert_eq!(runner.get(&view.id).await.unwrap(), finished);

        // Sender dropped with the hook: no second call.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_panicking_hook_is_contained() {
        let runner = runner(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let view = runner
            .submit(
                TaskSpec::new("true"),
                Some(Arc::new(PanickingHook(calls.clone()))),
            )
            .await
            .unwrap();
        let done = wait_terminal(&runner, &view.id).await;
        assert_eq!(done.status, TaskStatus::Succeeded);

        // Runner keeps working after the panic.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let next = runner.submit(TaskSpec::new("true"), None).await.unwrap();
        assert_eq!(wait_terminal(&runner, &next.id).await.status, TaskStatus::Succeeded);
    }
}
