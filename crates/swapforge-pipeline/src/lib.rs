pub mod background_change;
pub mod config;
pub mod factory;
pub mod head_swap;
pub mod input;
pub mod pipeline;
pub mod pose_change;
pub mod support;

pub use factory::{PipelineDispatch, PipelineSet};
pub use input::{PipelineInput, ProgressCallback};
pub use pipeline::Pipeline;
