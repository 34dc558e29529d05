use std::path::PathBuf;
use std::sync::Arc;

use swapforge_core::error::ForgeError;
use swapforge_core::types::EditMode;
use swapforge_engine::EngineClient;
use swapforge_registry::EngineRegistry;
use swapforge_store::ObjectStore;

use crate::background_change::BackgroundChangePipeline;
use crate::head_swap::HeadSwapPipeline;
use crate::pipeline::Pipeline;
use crate::pose_change::PoseChangePipeline;

/// The single step name every pipeline binds its engine under. Pipelines
/// here have exactly one step each, so the binding is `pipelines.<mode>.
/// steps.generate.engine` with a direct `get_engine(<mode>)` fallback, per
/// the registry's documented resolution order.
const STEP_NAME: &str = "generate";

fn pipeline_name(mode: EditMode) -> &'static str {
    match mode {
        EditMode::HeadSwap => "head_swap",
        EditMode::BackgroundChange => "background_change",
        EditMode::PoseChange => "pose_change",
    }
}

/// Dispatch-on-mode boundary the worker depends on. `PipelineSet` is the
/// production implementation; tests substitute their own to exercise the
/// worker loop without a live engine provider.
pub trait PipelineDispatch: Send + Sync {
    fn dispatch(&self, mode: EditMode) -> Arc<dyn Pipeline>;
}

/// Builds one bound `Pipeline` per edit mode at startup, the way the
/// engine registry itself is parsed once and treated immutable thereafter.
/// A missing engine binding fails fast rather than surfacing lazily on the
/// first task of that mode.
pub struct PipelineSet {
    head_swap: Arc<dyn Pipeline>,
    background_change: Arc<dyn Pipeline>,
    pose_change: Arc<dyn Pipeline>,
}

impl PipelineSet {
    pub fn build(
        registry: &EngineRegistry,
        object_store: Arc<dyn ObjectStore>,
        work_dir: PathBuf,
    ) -> Result<Self, ForgeError> {
        let head_swap = build_one(registry, EditMode::HeadSwap, object_store.clone(), work_dir.clone())?;
        let background_change =
            build_one(registry, EditMode::BackgroundChange, object_store.clone(), work_dir.clone())?;
        let pose_change = build_one(registry, EditMode::PoseChange, object_store, work_dir)?;
        Ok(Self { head_swap, background_change, pose_change })
    }

    pub fn dispatch(&self, mode: EditMode) -> &Arc<dyn Pipeline> {
        match mode {
            EditMode::HeadSwap => &self.head_swap,
            EditMode::BackgroundChange => &self.background_change,
            EditMode::PoseChange => &self.pose_change,
        }
    }
}

impl PipelineDispatch for PipelineSet {
    fn dispatch(&self, mode: EditMode) -> Arc<dyn Pipeline> {
        PipelineSet::dispatch(self, mode).clone()
    }
}

fn build_one(
    registry: &EngineRegistry,
    mode: EditMode,
    object_store: Arc<dyn ObjectStore>,
    work_dir: PathBuf,
) -> Result<Arc<dyn Pipeline>, ForgeError> {
    let name = pipeline_name(mode);
    let config = registry
        .get_engine_for_step(name, STEP_NAME)
        .ok_or_else(|| ForgeError::EngineNotBound(name.to_string()))?
        .clone();
    let engine = EngineClient::new(config);

    Ok(match mode {
        EditMode::HeadSwap => Arc::new(HeadSwapPipeline::new(object_store, engine, work_dir)),
        EditMode::BackgroundChange => Arc::new(BackgroundChangePipeline::new(object_store, engine, work_dir)),
        EditMode::PoseChange => Arc::new(PoseChangePipeline::new(object_store, engine, work_dir)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
engines:
  shared:
    type: runninghub
    config:
      base_url: "https://api.example.com"
      api_key: "test-key"
      workflow_id: "wf-1"
pipelines:
  head_swap:
    steps:
      generate:
        engine: shared
  background_change:
    steps:
      generate:
        engine: shared
  pose_change:
    steps:
      generate:
        engine: shared
"#;

    #[test]
    fn build_fails_fast_when_a_mode_has_no_engine_binding() {
        let registry = EngineRegistry::from_yaml_str(
            "engines:\n  shared:\n    type: runninghub\n    config:\n      base_url: \"https://x\"\n      api_key: \"k\"\n",
        )
        .unwrap();
        let db = swapforge_store::ForgeDb::open(tempfile::tempdir().unwrap().path()).unwrap();
        let result = PipelineSet::build(&registry, Arc::new(db), std::env::temp_dir());
        assert!(result.is_err());
    }

    #[test]
    fn build_succeeds_and_dispatches_all_three_modes() {
        let registry = EngineRegistry::from_yaml_str(SAMPLE).unwrap();
        let db = swapforge_store::ForgeDb::open(tempfile::tempdir().unwrap().path()).unwrap();
        let set = PipelineSet::build(&registry, Arc::new(db), std::env::temp_dir()).unwrap();

        assert_eq!(set.dispatch(EditMode::HeadSwap).mode(), EditMode::HeadSwap);
        assert_eq!(set.dispatch(EditMode::BackgroundChange).mode(), EditMode::BackgroundChange);
        assert_eq!(set.dispatch(EditMode::PoseChange).mode(), EditMode::PoseChange);
    }
}
