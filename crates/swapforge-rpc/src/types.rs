use serde::{Deserialize, Serialize};
use serde_json::Value;

use swapforge_store::{Task, TaskErrorInfo, TaskResult};

/// Wire shape for a task, mirroring the durable row minus the owning
/// `user_id` (the caller already knows who they are).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcTaskInfo {
    pub task_id: String,
    pub mode: String,
    pub status: String,
    pub progress: u8,
    pub current_step: String,
    pub source_image: String,
    pub reference_image: String,
    pub config: Value,
    pub credits_consumed: i64,
    pub result: Option<TaskResult>,
    pub error: Option<TaskErrorInfo>,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
    pub failed_at: Option<i64>,
    pub processing_time: Option<i64>,
}

impl From<Task> for RpcTaskInfo {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.task_id.to_string(),
            mode: task.mode.to_string(),
            status: task.status.to_string(),
            progress: task.progress,
            current_step: task.current_step,
            source_image: task.source_image,
            reference_image: task.reference_image,
            config: task.config,
            credits_consumed: task.credits_consumed,
            result: task.result,
            error: task.error,
            created_at: task.created_at,
            updated_at: task.updated_at,
            completed_at: task.completed_at,
            failed_at: task.failed_at,
            processing_time: task.processing_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcTaskPage {
    pub tasks: Vec<RpcTaskInfo>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcCancelResult {
    pub task_id: String,
    pub status: String,
}
