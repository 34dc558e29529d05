//! Wire shapes for the external workflow engine's `{code, msg, data}` HTTP
//! envelope. Mirrors the upload/submit/outputs endpoints of the upstream
//! provider API, not a generic engine protocol.

use serde::{Deserialize, Serialize};

/// One input binding in a workflow submission: which provider node receives
/// which uploaded file, under which field name.
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    #[serde(rename = "fieldName")]
    pub field_name: String,
    #[serde(rename = "fieldValue")]
    pub field_value: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    pub code: i32,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadData {
    #[serde(rename = "fileName")]
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitData {
    #[serde(rename = "taskId")]
    pub task_id: String,
}

/// One output artifact returned by the provider's outputs endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "fileUrl")]
    pub file_url: String,
    #[serde(rename = "fileType")]
    pub file_type: String,
    #[serde(rename = "nodeId")]
    pub node_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FailedReason {
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub exception_message: String,
}

/// Result of a workflow run. Classified by matching each output's `nodeId`
/// against the engine's configured `primary_node_ids`/`comparison_node_ids`;
/// if no output matches either set, falls back to positional order (first
/// output primary, second the side-by-side comparison).
#[derive(Debug, Clone)]
pub struct ExecuteResult {
    pub output_image: OutputItem,
    pub comparison_image: Option<OutputItem>,
    pub raw_outputs: Vec<OutputItem>,
}

/// Provider status codes observed on the outputs endpoint.
pub(crate) const CODE_SUCCESS: i32 = 0;
pub(crate) const CODE_RUNNING: i32 = 804;
pub(crate) const CODE_QUEUED: i32 = 813;
pub(crate) const CODE_FAILED: i32 = 805;
