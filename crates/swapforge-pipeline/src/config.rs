//! Mode-specific config records. Each pipeline parses the generic
//! `Task.config` JSON map into one of these, collapsing the mode's field
//! aliases to a single canonical reference-image handle per the alias
//! order the distilled spec gives (not the original's field-priority
//! order, where the two disagree).

use serde_json::Value;

use swapforge_core::types::{FileHandle, Quality};

fn first_str(config: &Value, keys: &[&str]) -> Option<FileHandle> {
    keys.iter()
        .find_map(|key| config.get(*key).and_then(Value::as_str))
        .map(|s| s.to_string())
}

fn bool_or(config: &Value, key: &str, default: bool) -> bool {
    config.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn f64_or(config: &Value, key: &str, default: f64) -> f64 {
    config.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn quality_or_default(config: &Value) -> Quality {
    match config.get("quality").and_then(Value::as_str) {
        Some("high") => Quality::High,
        Some("ultra") => Quality::Ultra,
        Some("standard") => Quality::Standard,
        _ => Quality::default(),
    }
}

/// Parsed HEAD_SWAP config. `reference_image` is the first of
/// `reference_image` / `target_face_image` / `cloth_image` present.
#[derive(Debug, Clone)]
pub struct HeadSwapConfig {
    pub reference_image: Option<FileHandle>,
    pub quality: Quality,
    pub preserve_details: bool,
    pub blend_strength: f64,
}

impl HeadSwapConfig {
    pub fn parse(config: &Value) -> Self {
        Self {
            reference_image: first_str(config, &["reference_image", "target_face_image", "cloth_image"]),
            quality: quality_or_default(config),
            preserve_details: bool_or(config, "preserve_details", true),
            blend_strength: f64_or(config, "blend_strength", 0.8),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundType {
    Custom,
    Preset,
    Remove,
}

impl BackgroundType {
    fn parse(config: &Value) -> Self {
        match config.get("background_type").and_then(Value::as_str) {
            Some("preset") => BackgroundType::Preset,
            Some("remove") => BackgroundType::Remove,
            _ => BackgroundType::Custom,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundType::Custom => "custom",
            BackgroundType::Preset => "preset",
            BackgroundType::Remove => "remove",
        }
    }
}

/// Parsed BACKGROUND_CHANGE config. `background_image` is the first of
/// `background_image` / `bg_image` present.
#[derive(Debug, Clone)]
pub struct BackgroundChangeConfig {
    pub background_image: Option<FileHandle>,
    pub background_type: BackgroundType,
}

impl BackgroundChangeConfig {
    pub fn parse(config: &Value) -> Self {
        Self {
            background_image: first_str(config, &["background_image", "bg_image"]),
            background_type: BackgroundType::parse(config),
        }
    }
}

/// Parsed POSE_CHANGE config. `pose_reference` is the first of
/// `pose_reference` / `pose_image` / `reference_image` present.
#[derive(Debug, Clone)]
pub struct PoseChangeConfig {
    pub pose_reference: Option<FileHandle>,
    pub preserve_face: bool,
    pub smoothness: f64,
}

impl PoseChangeConfig {
    pub fn parse(config: &Value) -> Self {
        Self {
            pose_reference: first_str(config, &["pose_reference", "pose_image", "reference_image"]),
            preserve_face: bool_or(config, "preserve_face", true),
            smoothness: f64_or(config, "smoothness", 0.7),
        }
    }
}
