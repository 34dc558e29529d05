use std::sync::Arc;

use serde_json::Value;

use swapforge_core::types::{FileHandle, TaskId};

/// Progress callback handed to a pipeline. Invocations may be dropped
/// without affecting correctness — they update auxiliary fields only, so
/// a pipeline never waits on or retries a call to it.
pub type ProgressCallback = Arc<dyn Fn(u8, &str) + Send + Sync>;

/// Everything one pipeline run needs, already stripped of the task row's
/// persistence concerns (those belong to the worker).
pub struct PipelineInput {
    pub task_id: TaskId,
    pub source_image: FileHandle,
    pub config: Value,
    pub progress: Option<ProgressCallback>,
}

impl PipelineInput {
    pub fn report(&self, percent: u8, step: &str) {
        if let Some(cb) = &self.progress {
            cb(percent, step);
        }
    }
}
