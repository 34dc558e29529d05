use serde::{Deserialize, Serialize};
use serde_json::Value;

use swapforge_core::{Credits, EditMode, FileHandle, TaskId, TaskStatus, Timestamp, UserId};

/// Durable user row. Mutated only by the credit ledger (balance fields) and
/// auth flows external to this core (login timestamp, password, plan).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub email: String,
    pub password_hash: Option<String>,
    pub activated: bool,
    pub current_credits: Credits,
    pub total_credits_used: Credits,
    pub current_plan_id: Option<String>,
    pub plan_renew_at: Option<Timestamp>,
    #[serde(default)]
    pub signup_bonus_granted: bool,
    pub created_at: Timestamp,
}

impl User {
    pub fn new(email: String, created_at: Timestamp) -> Self {
        Self {
            user_id: UserId::generate(),
            email,
            password_hash: None,
            activated: false,
            current_credits: 0,
            total_credits_used: 0,
            current_plan_id: None,
            plan_renew_at: None,
            signup_bonus_granted: false,
            created_at,
        }
    }
}

/// Transient email verification code. Becomes invalid (but not absent) on
/// first successful verification — `used` is set rather than the row
/// removed, so reuse is rejected explicitly rather than reported as
/// "not found".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCode {
    pub email: String,
    pub code: String,
    pub created_at: Timestamp,
    pub used: bool,
}

impl VerificationCode {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now - self.created_at > swapforge_core::constants::VERIFICATION_CODE_TTL_SECS
    }
}

/// Result payload attached to a successfully completed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub output_image: FileHandle,
    pub thumbnail: FileHandle,
    pub comparison_image: Option<FileHandle>,
    pub metadata: Value,
}

/// Error payload attached to a failed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskErrorInfo {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

/// Durable task record: the single source of truth for lifecycle status,
/// config, result and refund state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub user_id: UserId,
    pub mode: EditMode,
    pub status: TaskStatus,
    pub progress: u8,
    pub current_step: String,
    pub source_image: FileHandle,
    pub reference_image: FileHandle,
    pub config: Value,
    pub credits_consumed: Credits,
    pub result: Option<TaskResult>,
    pub error: Option<TaskErrorInfo>,
    /// Set at most once, by `mark_refunded_if_unset`, independent of
    /// `error` — a cancelled task owes a refund just as much as a failed
    /// one, and has no error payload to carry the marker on.
    #[serde(default)]
    pub refunded: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub failed_at: Option<Timestamp>,
    pub processing_time: Option<i64>,
}

impl Task {
    /// Whether a refund has already been recorded against this task.
    pub fn already_refunded(&self) -> bool {
        self.refunded
    }
}
