use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use swapforge_core::error::ForgeError;

use crate::engine_config::{EngineInstanceConfig, KNOWN_ENGINE_TYPES};
use crate::env_interp::interpolate_value;

/// Loaded, immutable engine configuration: named engine instances and the
/// `(pipeline, step) -> engine_name` lookup table.
pub struct EngineRegistry {
    engines: HashMap<String, EngineInstanceConfig>,
    bindings: HashMap<(String, String), String>,
}

impl EngineRegistry {
    /// Load and validate the registry from a YAML file, substituting
    /// `${VAR}`/`${VAR:default}` placeholders recursively before parsing
    /// structured config out of it. Fails fast on an unknown engine type
    /// or an un-defaulted missing environment variable.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForgeError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ForgeError::Other(format!("reading engine config: {e}")))?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ForgeError> {
        let parsed: serde_yaml::Value = serde_yaml::from_str(raw)
            .map_err(|e| ForgeError::Other(format!("parsing engine config: {e}")))?;
        let resolved = interpolate_value(parsed)?;

        let engines_value = resolved
            .get("engines")
            .cloned()
            .unwrap_or(serde_yaml::Value::Mapping(Default::default()));
        let engines_map: HashMap<String, RawEngineEntry> =
            serde_yaml::from_value(engines_value).map_err(|e| ForgeError::Other(e.to_string()))?;

        let mut engines = HashMap::new();
        for (name, entry) in engines_map {
            if !KNOWN_ENGINE_TYPES.contains(&entry.engine_type.as_str()) {
                return Err(ForgeError::UnknownEngineType(entry.engine_type));
            }
            let mut config = entry.config;
            // `type` lives alongside `config` in the source YAML but the
            // instance config struct wants it inline; graft it in before
            // deserializing the nested map.
            if let serde_yaml::Value::Mapping(ref mut map) = config {
                map.insert(
                    serde_yaml::Value::String("type".to_string()),
                    serde_yaml::Value::String(entry.engine_type.clone()),
                );
            }
            let instance: EngineInstanceConfig =
                serde_yaml::from_value(config).map_err(|e| ForgeError::Other(e.to_string()))?;
            info!(engine = %name, engine_type = %entry.engine_type, "engine registered");
            engines.insert(name, instance);
        }

        let bindings_value = resolved
            .get("pipelines")
            .cloned()
            .unwrap_or(serde_yaml::Value::Mapping(Default::default()));
        let pipelines: HashMap<String, PipelineSteps> =
            serde_yaml::from_value(bindings_value).map_err(|e| ForgeError::Other(e.to_string()))?;

        let mut bindings = HashMap::new();
        for (pipeline_name, steps) in pipelines {
            for (step_name, step_cfg) in steps.steps {
                bindings.insert((pipeline_name.clone(), step_name), step_cfg.engine);
            }
        }

        Ok(Self { engines, bindings })
    }

    /// Direct lookup by engine name.
    pub fn get_engine(&self, name: &str) -> Option<&EngineInstanceConfig> {
        self.engines.get(name)
    }

    /// Resolve via `pipelines.<pipeline>.steps.<step>.engine`, falling
    /// back to a direct `get_engine(pipeline)` lookup if no binding
    /// exists — a pipeline with a single unnamed step may bind its engine
    /// directly under the pipeline's own name.
    pub fn get_engine_for_step(&self, pipeline: &str, step: &str) -> Option<&EngineInstanceConfig> {
        if let Some(name) = self.bindings.get(&(pipeline.to_string(), step.to_string())) {
            return self.get_engine(name);
        }
        self.get_engine(pipeline)
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawEngineEntry {
    #[serde(rename = "type")]
    engine_type: String,
    #[serde(default)]
    config: serde_yaml::Value,
}

#[derive(Debug, serde::Deserialize)]
struct PipelineSteps {
    #[serde(default)]
    steps: HashMap<String, StepBinding>,
}

#[derive(Debug, serde::Deserialize)]
struct StepBinding {
    engine: String,
}
