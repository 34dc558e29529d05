use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::multipart;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use swapforge_core::error::ForgeError;
use swapforge_registry::EngineInstanceConfig;

use crate::types::{
    ApiEnvelope, ExecuteResult, FailedReason, NodeInfo, OutputItem, SubmitData, UploadData,
    CODE_FAILED, CODE_QUEUED, CODE_RUNNING, CODE_SUCCESS,
};

/// HTTP client for one configured engine instance. Talks to a single
/// upload/create/outputs endpoint triple; retry counts and backoff come
/// from the instance's config, falling back to the core defaults.
pub struct EngineClient {
    config: EngineInstanceConfig,
    http: reqwest::Client,
}

impl EngineClient {
    pub fn new(config: EngineInstanceConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Upload one local file and return the provider's assigned file name.
    pub async fn upload_image(&self, local_path: &Path) -> Result<String, ForgeError> {
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ForgeError::InvalidSourceImage(format!("{local_path:?}")))?
            .to_string();

        let mut last_err = None;
        for attempt in 1..=self.config.upload_max_retries {
            let bytes = tokio::fs::read(local_path)
                .await
                .map_err(|e| ForgeError::ImageLoadFailed(e.to_string()))?;
            let part = multipart::Part::bytes(bytes).file_name(file_name.clone());
            let form = multipart::Form::new()
                .text("apiKey", self.config.api_key.clone())
                .text("fileType", "input")
                .part("file", part);

            let url = format!("{}/task/openapi/upload", self.config.base_url);
            match self.http.post(&url).multipart(form).send().await {
                Ok(resp) => match resp.json::<ApiEnvelope<UploadData>>().await {
                    Ok(envelope) if envelope.code == CODE_SUCCESS => {
                        let data = envelope
                            .data
                            .ok_or_else(|| ForgeError::EngineFailed("upload: empty data".into()))?;
                        debug!(attempt, file = %data.file_name, "upload succeeded");
                        return Ok(data.file_name);
                    }
                    Ok(envelope) => {
                        last_err = Some(ForgeError::EngineFailed(envelope.msg));
                    }
                    Err(e) => last_err = Some(ForgeError::EngineUnavailable(e.to_string())),
                },
                Err(e) => last_err = Some(ForgeError::EngineUnavailable(e.to_string())),
            }

            warn!(attempt, "upload attempt failed, retrying");
            if attempt < self.config.upload_max_retries {
                tokio::time::sleep(Duration::from_secs(
                    swapforge_core::constants::UPLOAD_RETRY_BACKOFF_SECS,
                ))
                .await;
            }
        }
        Err(last_err.unwrap_or_else(|| ForgeError::EngineUnavailable("upload exhausted retries".into())))
    }

    /// Submit a workflow run with the given node bindings, returning the
    /// provider's task id.
    pub async fn submit_workflow(&self, node_info_list: Vec<NodeInfo>) -> Result<String, ForgeError> {
        let body = serde_json::json!({
            "apiKey": self.config.api_key,
            "workflowId": self.config.workflow_id,
            "nodeInfoList": node_info_list,
        });
        let url = format!("{}/task/openapi/create", self.config.base_url);

        let mut last_err = None;
        for attempt in 1..=self.config.submit_max_retries {
            match self.http.post(&url).json(&body).send().await {
                Ok(resp) => match resp.json::<ApiEnvelope<SubmitData>>().await {
                    Ok(envelope) if envelope.code == CODE_SUCCESS => {
                        let data = envelope
                            .data
                            .ok_or_else(|| ForgeError::EngineFailed("submit: empty data".into()))?;
                        info!(attempt, task_id = %data.task_id, "workflow submitted");
                        return Ok(data.task_id);
                    }
                    Ok(envelope) => last_err = Some(ForgeError::EngineFailed(envelope.msg)),
                    Err(e) => last_err = Some(ForgeError::EngineUnavailable(e.to_string())),
                },
                Err(e) => last_err = Some(ForgeError::EngineUnavailable(e.to_string())),
            }

            warn!(attempt, "submit attempt failed, retrying");
            if attempt < self.config.submit_max_retries {
                tokio::time::sleep(Duration::from_secs(
                    swapforge_core::constants::SUBMIT_RETRY_BACKOFF_SECS,
                ))
                .await;
            }
        }
        Err(last_err.unwrap_or_else(|| ForgeError::EngineUnavailable("submit exhausted retries".into())))
    }

    /// Poll until the provider reports completion, failure, or the instance
    /// timeout elapses.
    pub async fn poll_until_complete(&self, task_id: &str) -> Result<Vec<OutputItem>, ForgeError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        let url = format!("{}/task/openapi/outputs", self.config.base_url);

        loop {
            if Instant::now() >= deadline {
                return Err(ForgeError::EngineTimeout {
                    elapsed_secs: self.config.timeout_secs,
                });
            }

            let envelope = self.fetch_status(&url, task_id).await?;
            match envelope.code {
                CODE_SUCCESS => {
                    let outputs: Vec<OutputItem> = envelope
                        .data
                        .map(serde_json::from_value)
                        .transpose()
                        .map_err(|e| ForgeError::Serialization(e.to_string()))?
                        .unwrap_or_default();
                    return Ok(outputs);
                }
                CODE_FAILED => {
                    let reason: Option<FailedReason> = envelope
                        .data
                        .map(serde_json::from_value)
                        .transpose()
                        .map_err(|e| ForgeError::Serialization(e.to_string()))?;
                    let message = reason
                        .map(|r| format!("{}: {}", r.node_name, r.exception_message))
                        .unwrap_or(envelope.msg);
                    return Err(ForgeError::EngineFailed(message));
                }
                CODE_RUNNING | CODE_QUEUED => {
                    debug!(task_id, code = envelope.code, "task still in flight");
                }
                other => {
                    warn!(task_id, code = other, "unrecognized status code, continuing to poll");
                }
            }

            tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs)).await;
        }
    }

    async fn fetch_status(
        &self,
        url: &str,
        task_id: &str,
    ) -> Result<ApiEnvelope<serde_json::Value>, ForgeError> {
        let body = serde_json::json!({
            "apiKey": self.config.api_key,
            "taskId": task_id,
        });

        let mut last_err = None;
        for _ in 0..=swapforge_core::constants::POLL_MAX_RETRIES {
            match self.http.post(url).json(&body).send().await {
                Ok(resp) => match resp.json::<ApiEnvelope<serde_json::Value>>().await {
                    Ok(envelope) => return Ok(envelope),
                    Err(e) => last_err = Some(ForgeError::EngineUnavailable(e.to_string())),
                },
                Err(e) => last_err = Some(ForgeError::EngineUnavailable(e.to_string())),
            }
        }
        Err(last_err.unwrap_or_else(|| ForgeError::EngineUnavailable("status fetch exhausted retries".into())))
    }

    /// Download a finished output to a local path.
    pub async fn download_image(&self, url: &str, destination: &Path) -> Result<(), ForgeError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ForgeError::ResultNotFound(e.to_string()))?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ForgeError::ResultNotFound(e.to_string()))?;
        tokio::fs::write(destination, &bytes)
            .await
            .map_err(|e| ForgeError::ResultSaveFailed(e.to_string()))
    }

    /// Upload every input, submit the workflow, and poll it to completion,
    /// classifying outputs by `nodeId` against the configured primary/
    /// comparison sets, falling back to positional order when nothing
    /// matches.
    pub async fn execute(&self, inputs: &HashMap<String, PathBuf>) -> Result<ExecuteResult, ForgeError> {
        let mut node_info_list = Vec::with_capacity(inputs.len());
        for (field, path) in inputs {
            let file_name = self.upload_image(path).await?;
            let node_id = self
                .config
                .input_node_map
                .get(field)
                .cloned()
                .unwrap_or_else(|| self.config.primary_node_ids[0].clone());
            node_info_list.push(NodeInfo {
                node_id,
                field_name: "image".to_string(),
                field_value: file_name,
            });
        }

        let task_id = self.submit_workflow(node_info_list).await?;
        let outputs = self.poll_until_complete(&task_id).await?;

        if outputs.is_empty() {
            return Err(ForgeError::ResultNotFound(format!("task {task_id} produced no outputs")));
        }
        let (primary, comparison) = classify_outputs(&self.config, &outputs);
        let output_image = primary.ok_or_else(|| {
            ForgeError::ResultNotFound(format!("task {task_id} produced no classifiable primary output"))
        })?;

        Ok(ExecuteResult {
            output_image,
            comparison_image: comparison,
            raw_outputs: outputs,
        })
    }
}

/// Classifies outputs by matching `nodeId` against the engine's configured
/// `primary_node_ids`/`comparison_node_ids`. If neither set matches any
/// output, falls back to positional order: the first file is primary, the
/// second (if present) is the comparison.
fn classify_outputs(
    config: &EngineInstanceConfig,
    outputs: &[OutputItem],
) -> (Option<OutputItem>, Option<OutputItem>) {
    let primary = outputs
        .iter()
        .find(|o| config.primary_node_ids.iter().any(|id| id == &o.node_id))
        .cloned();
    let comparison = outputs
        .iter()
        .find(|o| config.comparison_node_ids.iter().any(|id| id == &o.node_id))
        .cloned();

    if primary.is_some() || comparison.is_some() {
        (primary, comparison)
    } else {
        (outputs.first().cloned(), outputs.get(1).cloned())
    }
}

#[cfg(test)]
mod classify_tests {
    use super::*;

    fn config_with(primary: Vec<&str>, comparison: Vec<&str>) -> EngineInstanceConfig {
        EngineInstanceConfig {
            engine_type: "runninghub".to_string(),
            base_url: "https://example.com".to_string(),
            api_key: "key".to_string(),
            workflow_id: None,
            timeout_secs: 300,
            poll_interval_secs: 3,
            upload_max_retries: 3,
            submit_max_retries: 5,
            primary_node_ids: primary.into_iter().map(String::from).collect(),
            comparison_node_ids: comparison.into_iter().map(String::from).collect(),
            input_node_map: HashMap::new(),
        }
    }

    fn output(node_id: &str) -> OutputItem {
        OutputItem {
            file_url: format!("https://cdn.example.com/{node_id}.png"),
            file_type: "image/png".to_string(),
            node_id: node_id.to_string(),
        }
    }

    #[test]
    fn classifies_by_configured_node_ids_regardless_of_order() {
        let config = config_with(vec!["3"], vec!["7"]);
        let outputs = vec![output("7"), output("3")];
        let (primary, comparison) = classify_outputs(&config, &outputs);
        assert_eq!(primary.unwrap().node_id, "3");
        assert_eq!(comparison.unwrap().node_id, "7");
    }

    #[test]
    fn falls_back_to_positional_order_when_no_node_id_matches() {
        let config = config_with(vec!["99"], vec!["100"]);
        let outputs = vec![output("1"), output("2")];
        let (primary, comparison) = classify_outputs(&config, &outputs);
        assert_eq!(primary.unwrap().node_id, "1");
        assert_eq!(comparison.unwrap().node_id, "2");
    }

    #[test]
    fn single_output_with_no_match_is_positional_primary_only() {
        let config = config_with(vec!["99"], vec!["100"]);
        let outputs = vec![output("1")];
        let (primary, comparison) = classify_outputs(&config, &outputs);
        assert_eq!(primary.unwrap().node_id, "1");
        assert!(comparison.is_none());
    }
}
