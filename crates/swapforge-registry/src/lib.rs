pub mod engine_config;
pub mod env_interp;
pub mod registry;

pub use engine_config::EngineInstanceConfig;
pub use registry::EngineRegistry;
