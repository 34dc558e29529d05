use std::time::Duration;

use tracing::debug;

use swapforge_core::error::ForgeError;
use swapforge_core::types::TaskId;
use swapforge_store::kv_store::KvStore;

/// KV keys the queue lives under. Named to match the persisted-key
/// convention the distilled interface documents.
pub const QUEUE_LIST_KEY: &str = "task:queue";
pub const PROCESSING_SET_KEY: &str = "task:processing";

/// Interval between polling attempts inside `pop_blocking`. The underlying
/// KV store has no native blocking-pop primitive, so the wait is
/// emulated with a short poll loop rather than a push notification.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Append a task id to the tail of the FIFO queue.
pub fn push(store: &dyn KvStore, task_id: &TaskId) -> Result<(), ForgeError> {
    store.list_push(QUEUE_LIST_KEY, task_id.as_str().as_bytes())
}

/// Pop the head of the queue and atomically add it to the processing set,
/// blocking up to `timeout` if the queue is empty. Returning `None` on
/// timeout is benign idle, not an error — callers must not treat it as one.
pub async fn pop_blocking(store: &dyn KvStore, timeout: Duration) -> Result<Option<TaskId>, ForgeError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(bytes) = store.list_pop_front(QUEUE_LIST_KEY)? {
            let id = TaskId::from_hex(String::from_utf8_lossy(&bytes).into_owned());
            store.set_add(PROCESSING_SET_KEY, id.as_str().as_bytes())?;
            return Ok(Some(id));
        }
        if tokio::time::Instant::now() >= deadline {
            debug!("pop_blocking idle: queue empty within timeout");
            return Ok(None);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Remove a task id from the processing set. Called on any terminal
/// transition, success or failure alike.
pub fn mark_complete(store: &dyn KvStore, task_id: &TaskId) -> Result<(), ForgeError> {
    store.set_remove(PROCESSING_SET_KEY, task_id.as_str().as_bytes())
}

pub fn length(store: &dyn KvStore) -> Result<u64, ForgeError> {
    store.list_len(QUEUE_LIST_KEY)
}

pub fn processing_count(store: &dyn KvStore) -> Result<u64, ForgeError> {
    store.set_len(PROCESSING_SET_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swapforge_store::ForgeDb;

    fn open_temp() -> ForgeDb {
        let dir = tempfile::tempdir().unwrap();
        ForgeDb::open(dir.path()).unwrap()
    }

    #[tokio::test]
    async fn push_then_pop_returns_the_id() {
        let db = open_temp();
        let id = TaskId::generate(1);
        push(&db, &id).unwrap();

        let popped = pop_blocking(&db, Duration::from_millis(500)).await.unwrap();
        assert_eq!(popped, Some(id.clone()));
        assert_eq!(processing_count(&db).unwrap(), 1);

        mark_complete(&db, &id).unwrap();
        assert_eq!(processing_count(&db).unwrap(), 0);
    }

    #[tokio::test]
    async fn pop_blocking_times_out_on_empty_queue_without_erroring() {
        let db = open_temp();
        let popped = pop_blocking(&db, Duration::from_millis(150)).await.unwrap();
        assert_eq!(popped, None);
    }

    #[tokio::test]
    async fn queue_is_fifo() {
        let db = open_temp();
        let first = TaskId::generate(1);
        let second = TaskId::generate(2);
        push(&db, &first).unwrap();
        push(&db, &second).unwrap();

        assert_eq!(length(&db).unwrap(), 2);
        let popped_first = pop_blocking(&db, Duration::from_millis(100)).await.unwrap();
        assert_eq!(popped_first, Some(first));
        let popped_second = pop_blocking(&db, Duration::from_millis(100)).await.unwrap();
        assert_eq!(popped_second, Some(second));
    }
}
