pub mod classify;
pub mod runner;

pub use runner::{run_once, run_loop, PollOutcome, WorkerConfig, WorkerDeps};
