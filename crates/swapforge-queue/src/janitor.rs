use tracing::{info, warn};

use swapforge_core::error::ForgeError;
use swapforge_core::types::{TaskId, TaskStatus, Timestamp};
use swapforge_store::kv_store::KvStore;
use swapforge_store::relational_store::RelationalStore;

use crate::queue::{self, PROCESSING_SET_KEY};

/// Re-enqueues processing-set entries abandoned by a crashed worker.
///
/// At-least-once delivery means the queue and the durable row can
/// disagree after a crash: the task stays in the `processing` set and its
/// row stays `processing` forever unless something notices. This compares
/// the processing set against task rows whose `updated_at` is older than
/// `2 x poll_timeout` and re-pushes them onto the queue, per the
/// recommendation that implementers bring a janitor into scope.
pub fn sweep_stale(
    kv: &dyn KvStore,
    relational: &dyn RelationalStore,
    stale_threshold_secs: i64,
    now: Timestamp,
) -> Result<u32, ForgeError> {
    let mut requeued = 0;
    for (member, _claimed_at) in kv.set_members_with_timestamps(PROCESSING_SET_KEY)? {
        let task_id = TaskId::from_hex(String::from_utf8_lossy(&member).into_owned());
        let Some(task) = relational.get_task(&task_id)? else {
            warn!(task_id = %task_id, "processing entry has no matching task row, dropping");
            kv.set_remove(PROCESSING_SET_KEY, &member)?;
            continue;
        };

        if task.status != TaskStatus::Processing {
            // Already reached a terminal state; the worker just hasn't
            // called mark_complete yet or a previous sweep already acted.
            kv.set_remove(PROCESSING_SET_KEY, &member)?;
            continue;
        }

        if now - task.updated_at >= stale_threshold_secs {
            kv.set_remove(PROCESSING_SET_KEY, &member)?;
            queue::push(kv, &task_id)?;
            requeued += 1;
            info!(task_id = %task_id, "re-enqueued stale processing task");
        }
    }
    Ok(requeued)
}
