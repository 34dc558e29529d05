use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use serde_json::Value;

use crate::types::{RpcCancelResult, RpcTaskInfo, RpcTaskPage};

/// SwapForge JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "swapforge_" via `namespace = "swapforge"`.
/// This is the subset of the task HTTP surface this core owns directly;
/// auth, signup/login, and administrative endpoints are routing glue layered
/// on top and stay out of scope here.
#[rpc(server, namespace = "swapforge")]
pub trait SwapForgeApi {
    /// Pre-charge credits, persist a pending task row, and enqueue it.
    #[method(name = "createTask")]
    async fn create_task(
        &self,
        token: String,
        mode: String,
        source_image: String,
        config: Value,
    ) -> RpcResult<RpcTaskInfo>;

    /// Fetch a single task, scoped to the caller's ownership.
    #[method(name = "getTask")]
    async fn get_task(&self, token: String, task_id: String) -> RpcResult<RpcTaskInfo>;

    /// List the caller's own tasks, optionally filtered by status/mode.
    #[method(name = "listTasks")]
    async fn list_tasks(
        &self,
        token: String,
        status: Option<String>,
        mode: Option<String>,
        page: u32,
        page_size: u32,
    ) -> RpcResult<RpcTaskPage>;

    /// Cancel a task the caller owns. Rejected as a terminal-state
    /// transition if the task has already reached a terminal status.
    #[method(name = "cancelTask")]
    async fn cancel_task(&self, token: String, task_id: String) -> RpcResult<RpcCancelResult>;
}
