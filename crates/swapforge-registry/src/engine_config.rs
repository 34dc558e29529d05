use std::collections::HashMap;

use serde::Deserialize;

/// Static, per-instance configuration for one named engine. Loaded once at
/// startup and treated immutable thereafter.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineInstanceConfig {
    #[serde(rename = "type")]
    pub engine_type: String,
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_upload_max_retries")]
    pub upload_max_retries: u32,
    #[serde(default = "default_submit_max_retries")]
    pub submit_max_retries: u32,

    /// Node-ID-to-role classification, lifted into config rather than
    /// hard-coded: the set of node ids whose output is the primary image
    /// vs. the comparison image. The upstream provider's own default
    /// mapping (`"3"` for raw image, `"7"` for pose/comparison image)
    /// becomes this field's default rather than a compiled-in constant.
    #[serde(default = "default_primary_node_ids")]
    pub primary_node_ids: Vec<String>,
    #[serde(default = "default_comparison_node_ids")]
    pub comparison_node_ids: Vec<String>,

    /// Canonical pipeline input name (`raw_image`, `pose_image`,
    /// `head_image`, ...) to provider node id. Covers all three pipelines'
    /// field names by default so a single engine instance can be shared;
    /// override per-instance when a workflow uses different node wiring.
    #[serde(default = "default_input_node_map")]
    pub input_node_map: HashMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    swapforge_core::constants::POLL_TIMEOUT_SECS
}

fn default_poll_interval_secs() -> u64 {
    swapforge_core::constants::POLL_INTERVAL_SECS
}

fn default_upload_max_retries() -> u32 {
    swapforge_core::constants::UPLOAD_MAX_RETRIES
}

fn default_submit_max_retries() -> u32 {
    swapforge_core::constants::SUBMIT_MAX_RETRIES
}

fn default_primary_node_ids() -> Vec<String> {
    vec!["3".to_string()]
}

fn default_comparison_node_ids() -> Vec<String> {
    vec!["7".to_string()]
}

fn default_input_node_map() -> HashMap<String, String> {
    [
        ("raw_image", "3"),
        ("pose_image", "7"),
        ("head_image", "3"),
        ("cloth_image", "7"),
        ("model_image", "3"),
        ("bg_image", "7"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Known engine types. Registry load fails fast on anything else.
pub const KNOWN_ENGINE_TYPES: &[&str] = &["external_api", "comfyui", "runninghub"];
