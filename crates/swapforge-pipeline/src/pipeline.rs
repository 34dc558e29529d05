use async_trait::async_trait;

use swapforge_core::error::ForgeError;
use swapforge_core::types::EditMode;
use swapforge_store::TaskResult;

use crate::input::PipelineInput;

/// Orchestration contract shared by the three edit-mode pipelines: bind
/// config fields to engine inputs, invoke the engine, and package outputs.
/// Modeled as a trait object rather than an inheritance hierarchy, per the
/// dynamic-dispatch-on-mode design note.
#[async_trait]
pub trait Pipeline: Send + Sync {
    fn mode(&self) -> EditMode;

    /// Runs the pipeline to completion. Any failing step returns a typed
    /// `ForgeError` drawn from the error taxonomy — failure is surfaced to
    /// the caller (the worker), never swallowed.
    async fn execute(&self, input: PipelineInput) -> Result<TaskResult, ForgeError>;
}
