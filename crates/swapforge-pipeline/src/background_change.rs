use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use swapforge_core::error::ForgeError;
use swapforge_core::types::EditMode;
use swapforge_engine::EngineClient;
use swapforge_store::{ObjectStore, TaskResult};

use crate::config::BackgroundChangeConfig;
use crate::input::PipelineInput;
use crate::pipeline::Pipeline;
use crate::support::{download_and_store, make_and_store_thumbnail, materialize};

/// BACKGROUND_CHANGE pipeline: replaces the background behind the subject
/// in `source_image`. Engine input fields are `model_image` (source) and
/// `bg_image` (reference), per the upstream workflow's node wiring.
///
/// A `background_type` of `remove` still requires a reference image in
/// this core's contract — background removal without a replacement plate
/// is a distinct workflow the upstream provider does not expose here.
pub struct BackgroundChangePipeline {
    object_store: Arc<dyn ObjectStore>,
    engine: EngineClient,
    work_dir: PathBuf,
}

impl BackgroundChangePipeline {
    pub fn new(object_store: Arc<dyn ObjectStore>, engine: EngineClient, work_dir: PathBuf) -> Self {
        Self { object_store, engine, work_dir }
    }
}

#[async_trait]
impl Pipeline for BackgroundChangePipeline {
    fn mode(&self) -> EditMode {
        EditMode::BackgroundChange
    }

    async fn execute(&self, input: PipelineInput) -> Result<TaskResult, ForgeError> {
        input.report(10, "validating inputs");
        if self.object_store.get_object(&input.source_image)?.is_none() {
            return Err(ForgeError::InvalidSourceImage(input.source_image.clone()));
        }

        let config = BackgroundChangeConfig::parse(&input.config);
        let background_image = config
            .background_image
            .clone()
            .ok_or_else(|| ForgeError::MissingReferenceImage(EditMode::BackgroundChange.to_string()))?;
        if self.object_store.get_object(&background_image)?.is_none() {
            return Err(ForgeError::InvalidSourceImage(background_image));
        }
        input.report(20, "config parsed");

        let model_path =
            materialize(&*self.object_store, &self.work_dir, &input.task_id, "model", &input.source_image)?;
        let bg_path =
            materialize(&*self.object_store, &self.work_dir, &input.task_id, "bg", &background_image)?;

        input.report(30, "calling AI engine");
        let mut inputs = std::collections::HashMap::new();
        inputs.insert("model_image".to_string(), model_path);
        inputs.insert("bg_image".to_string(), bg_path);
        let result = self.engine.execute(&inputs).await?;
        info!(task_id = %input.task_id, "background change engine run complete");
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
                "background_type": config.background_type.as_str(),
            }),
        })
    }
}
