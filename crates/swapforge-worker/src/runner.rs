use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use swapforge_core::constants::QUEUE_POP_TIMEOUT_SECS;
use swapforge_core::error::ForgeError;
use swapforge_core::types::{TaskId, TaskStatus};
use swapforge_pipeline::{PipelineDispatch, PipelineInput};
use swapforge_queue::{mark_complete, pop_blocking, push};
use swapforge_store::kv_store::KvStore;
use swapforge_store::relational_store::RelationalStore;

use crate::classify::{classify, classify_join_error};

/// What one `run_once` iteration actually did, for callers that want to log
/// or test throughput without caring about task contents.
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The queue was empty for the whole poll window.
    Idle,
    /// A task was claimed and driven to a terminal state.
    Processed(TaskId),
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub pop_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pop_timeout: Duration::from_secs(QUEUE_POP_TIMEOUT_SECS),
        }
    }
}

/// The storage and pipeline collaborators one worker needs. Cheap to clone
/// (everything is an `Arc`), so a process can run several loop tasks over
/// the same dependencies for extra throughput.
#[derive(Clone)]
pub struct WorkerDeps {
    pub relational: Arc<dyn RelationalStore>,
    pub kv: Arc<dyn KvStore>,
    pub pipelines: Arc<dyn PipelineDispatch>,
}

/// Runs the worker loop until `shutdown` is set. Mirrors the pop loop's own
/// idle/timeout distinction: a quiet queue is not logged as an error.
pub async fn run_loop(deps: &WorkerDeps, config: &WorkerConfig, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) {
        if let Err(err) = run_once(deps, config).await {
            // Storage/infra failures land here, not pipeline failures — those
            // are already converted into a failed task row by `run_once`.
            // A single bad iteration must never take the worker down.
            error!(error = %err, "worker iteration failed, continuing");
        }
    }
    info!("worker loop exiting on shutdown signal");
}

/// One claim-dispatch-commit cycle. Never returns `Err` for a task failure —
/// pipeline and join errors are converted into a durable `failed` row with a
/// refund. `Err` here means a storage/infra operation itself failed.
pub async fn run_once(deps: &WorkerDeps, config: &WorkerConfig) -> Result<PollOutcome, ForgeError> {
    let Some(task_id) = pop_blocking(&*deps.kv, config.pop_timeout).await? else {
        return Ok(PollOutcome::Idle);
    };

    let claimed_at = Utc::now().timestamp();
    deps.relational.update_status(
        &task_id,
        TaskStatus::Processing,
        Some(0),
        Some("claimed".to_string()),
        None,
        None,
        None,
        claimed_at,
    )?;

    let Some(task) = deps.relational.get_task(&task_id)? else {
        warn!(task_id = %task_id, "claimed task has no durable row, dropping");
        mark_complete(&*deps.kv, &task_id)?;
        return Ok(PollOutcome::Processed(task_id));
    };

    let pipeline = deps.pipelines.dispatch(task.mode);
    let input = PipelineInput {
        task_id: task.task_id.clone(),
        source_image: task.source_image.clone(),
        config: task.config.clone(),
        progress: None,
    };

    let started_at = Utc::now().timestamp();
    // Isolated in its own task so a pipeline panic surfaces as a `JoinError`
    // instead of taking the whole worker process down with it.
    let join_result = tokio::spawn(async move { pipeline.execute(input).await }).await;
    let finished_at = Utc::now().timestamp();
    let processing_time = finished_at - started_at;

    let (terminal_status, step, error_info, result) = match join_result {
        Ok(Ok(result)) => (TaskStatus::Done, "done", None, Some(result)),
        Ok(Err(forge_err)) => {
            warn!(task_id = %task_id, error = %forge_err, "pipeline failed");
            (TaskStatus::Failed, "failed", Some(classify(&forge_err)), None)
        }
        Err(join_err) => {
            error!(task_id = %task_id, error = %join_err, "pipeline task panicked");
            (TaskStatus::Failed, "failed", Some(classify_join_error(&join_err)), None)
        }
    };
    let progress = if terminal_status == TaskStatus::Done { Some(100) } else { None };

    let applied = deps.relational.update_status(
        &task_id,
        terminal_status,
        progress,
        Some(step.to_string()),
        result,
        error_info,
        Some(processing_time),
        finished_at,
    )?;
    if !applied {
        info!(task_id = %task_id, "task already terminal at commit time (likely user-cancelled)");
    }

    // Whatever actually landed wins, regardless of whether our own write was
    // the one that applied: a cancel racing with a successful run still owes
    // a refund, and a failure that raced a cancel still owes exactly one.
    if let Some(final_task) = deps.relational.get_task(&task_id)? {
        if final_task.status != TaskStatus::Done {
            swapforge_billing::refund_if_not_refunded(&*deps.relational, &final_task, finished_at)?;
        }
    }

    mark_complete(&*deps.kv, &task_id)?;
    Ok(PollOutcome::Processed(task_id))
}

/// Re-enqueues processing-set entries abandoned by a crashed worker. Exposed
/// here so a node binary can run it on a timer alongside the main loop
/// without depending on `swapforge-queue` directly.
pub fn sweep_stale(deps: &WorkerDeps, stale_threshold_secs: i64) -> Result<u32, ForgeError> {
    swapforge_queue::sweep_stale(&*deps.kv, &*deps.relational, stale_threshold_secs, Utc::now().timestamp())
}

#[allow(dead_code)]
fn requeue(kv: &dyn KvStore, task_id: &TaskId) -> Result<(), ForgeError> {
    push(kv, task_id)
}
