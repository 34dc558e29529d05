//! swapforge-rpc
//!
//! JSON-RPC 2.0 facade exposing the task surface this core owns directly.
//!
//! Namespace: "swapforge"
//! Methods:
//!   swapforge_createTask — pre-charge credits, persist and enqueue a task
//!   swapforge_getTask    — fetch a task, scoped to the caller
//!   swapforge_listTasks  — list the caller's own tasks
//!   swapforge_cancelTask — cancel a task the caller owns

pub mod api;
pub mod identity;
pub mod server;
pub mod types;

pub use identity::Identity;
pub use server::{RpcServer, RpcServerState};
pub use types::{RpcCancelResult, RpcTaskInfo, RpcTaskPage};
