use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use swapforge_core::error::ForgeError;
use swapforge_core::types::EditMode;
use swapforge_engine::EngineClient;
use swapforge_store::{ObjectStore, TaskResult};

use crate::config::PoseChangeConfig;
use crate::input::PipelineInput;
use crate::pipeline::Pipeline;
use crate::support::{download_and_store, make_and_store_thumbnail, materialize};

/// POSE_CHANGE pipeline: re-poses the subject in `source_image` to match
/// the resolved pose reference. Engine input fields are `raw_image`
/// (source) and `pose_image` (reference), per the upstream workflow's
/// node wiring.
pub struct PoseChangePipeline {
    object_store: Arc<dyn ObjectStore>,
    engine: EngineClient,
    work_dir: PathBuf,
}

impl PoseChangePipeline {
    pub fn new(object_store: Arc<dyn ObjectStore>, engine: EngineClient, work_dir: PathBuf) -> Self {
        Self { object_store, engine, work_dir }
    }
}

#[async_trait]
impl Pipeline for PoseChangePipeline {
    fn mode(&self) -> EditMode {
        EditMode::PoseChange
    }

    async fn execute(&self, input: PipelineInput) -> Result<TaskResult, ForgeError> {
        input.report(10, "validating inputs");
        if self.object_store.get_object(&input.source_image)?.is_none() {
            return Err(ForgeError::InvalidSourceImage(input.source_image.clone()));
        }

        let config = PoseChangeConfig::parse(&input.config);
        let pose_reference = config
            .pose_reference
            .clone()
            .ok_or_else(|| ForgeError::MissingReferenceImage(EditMode::PoseChange.to_string()))?;
        if self.object_store.get_object(&pose_reference)?.is_none() {
            return Err(ForgeError::InvalidSourceImage(pose_reference));
        }
        input.report(20, "config parsed");

        let raw_path =
            materialize(&*self.object_store, &self.work_dir, &input.task_id, "raw", &input.source_image)?;
        let pose_path =
            materialize(&*self.object_store, &self.work_dir, &input.task_id, "pose", &pose_reference)?;

        input.report(30, "calling AI engine");
        let mut inputs = std::collections::HashMap::new();
        inputs.insert("raw_image".to_string(), raw_path);
        inputs.insert("pose_image".to_string(), pose_path);
        let result = self.engine.execute(&inputs).await?;
        info!(task_id = %input.task_id, "pose change engine run complete");
        input.report(70, "engine run complete");

        input.report(80, "saving results");
        let output_id = format!("{}_output", input.task_id);
        let output_bytes =
            download_and_store(&self.engine, &*self.object_store, &self.work_dir, &result.output_image.file_url, &output_id)
                .await?;

        let comparison_id = match &result.comparison_image {
            Some(comparison) => {
                let id = format!("{}_comparison", input.task_id);
                download_and_store(&self.engine, &*self.object_store, &self.work_dir, &comparison.file_url, &id).await?;
                Some(id)
            }
            None => None,
        };

        input.report(90, "generating thumbnail");
        let thumbnail_id = format!("{}_thumb", input.task_id);
        let (width, height) = make_and_store_thumbnail(&*self.object_store, &output_bytes, &thumbnail_id)?;

        input.report(100, "done");
        Ok(TaskResult {
            output_image: output_id,
            thumbnail: thumbnail_id,
            comparison_image: comparison_id,
            metadata: serde_json::json!({
                "width": width,
                "height": height,
                "preserve_face": config.preserve_face,
                "smoothness": config.smoothness,
            }),
        })
    }
}
