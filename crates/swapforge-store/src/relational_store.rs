use swapforge_core::error::ForgeError;
use swapforge_core::types::{EditMode, TaskId, TaskStatus, UserId};

use crate::model::{Task, User};

/// Durable, queryable storage for users and tasks: the relational store
/// facade. The only authoritative home for user balances and task rows —
/// a production deployment can back this with Postgres behind the same
/// trait without touching callers.
pub trait RelationalStore: Send + Sync {
    fn get_user(&self, user_id: &UserId) -> Result<Option<User>, ForgeError>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ForgeError>;
    fn put_user(&self, user: &User) -> Result<(), ForgeError>;

    /// Conditional credit debit: succeeds only if `current_credits >= amount`,
    /// in which case it atomically decrements the balance and increments
    /// `total_credits_used`. Returns `false` (no state change) if the
    /// balance was insufficient.
    fn try_debit(&self, user_id: &UserId, amount: i64) -> Result<bool, ForgeError>;

    fn credit(&self, user_id: &UserId, amount: i64) -> Result<(), ForgeError>;

    fn insert_task(&self, task: &Task) -> Result<(), ForgeError>;
    fn get_task(&self, task_id: &TaskId) -> Result<Option<Task>, ForgeError>;

    /// Overwrite a task row unconditionally. Callers that must respect the
    /// terminal-state invariant go through `update_status` instead.
    fn put_task(&self, task: &Task) -> Result<(), ForgeError>;

    /// Apply a status transition. Returns `Ok(false)` without writing
    /// anything if the task is already in a terminal state.
    #[allow(clippy::too_many_arguments)]
    fn update_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        progress: Option<u8>,
        current_step: Option<String>,
        result: Option<crate::model::TaskResult>,
        error: Option<crate::model::TaskErrorInfo>,
        processing_time: Option<i64>,
        now: i64,
    ) -> Result<bool, ForgeError>;

    /// Atomically sets the refund marker (`task.refunded`) on a task
    /// row if it is not already set — independent of whether the task's
    /// `status` is terminal, since the one-shot terminal-transition rule
    /// governs `status` changes, not this auxiliary marker. Returns `true`
    /// if this call is the one that set it (the caller should proceed to
    /// credit the balance); `false` if it was already set (a no-op).
    fn mark_refunded_if_unset(&self, task_id: &TaskId) -> Result<bool, ForgeError>;

    fn list_tasks(
        &self,
        user_id: &UserId,
        status: Option<TaskStatus>,
        mode: Option<EditMode>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Task>, ForgeError>;

    fn count_tasks(
        &self,
        user_id: &UserId,
        status: Option<TaskStatus>,
        mode: Option<EditMode>,
    ) -> Result<u64, ForgeError>;
}
