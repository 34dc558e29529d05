use swapforge_core::error::ForgeError;
use swapforge_store::TaskErrorInfo;

/// Turns a pipeline failure into the durable error payload, tagged with the
/// same machine-readable code an RPC facade would report to a client.
pub fn classify(err: &ForgeError) -> TaskErrorInfo {
    TaskErrorInfo {
        code: err.code().to_string(),
        message: err.to_string(),
        details: None,
    }
}

/// A panic inside a dispatched pipeline surfaces as a `JoinError`, not a
/// `ForgeError` — the worker still owes the task a terminal write and a
/// refund, so it gets folded into the same taxonomy as `INTERNAL_ERROR`.
pub fn classify_join_error(err: &tokio::task::JoinError) -> TaskErrorInfo {
    TaskErrorInfo {
        code: "INTERNAL_ERROR".to_string(),
        message: format!("pipeline task panicked: {err}"),
        details: None,
    }
}
