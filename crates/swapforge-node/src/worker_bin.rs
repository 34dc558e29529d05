//! swapforge-worker-bin — the Worker loop binary.
//!
//! Startup sequence:
//!   1. Open the persistent store
//!   2. Load the engine registry and build a bound `PipelineSet`
//!   3. Run the worker loop until a shutdown signal, with a periodic
//!      janitor sweep for stale `processing` entries alongside it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use swapforge_core::constants::{POLL_TIMEOUT_SECS, QUEUE_POP_TIMEOUT_SECS, STALE_PROCESSING_MULTIPLIER};
use swapforge_pipeline::PipelineSet;
use swapforge_registry::EngineRegistry;
use swapforge_store::ForgeDb;
use swapforge_worker::{run_loop, WorkerConfig, WorkerDeps};

#[derive(Parser, Debug)]
#[command(name = "swapforge-worker-bin", version, about = "SwapForge task worker")]
struct Args {
    /// Directory for the persistent store (shared with swapforge-api).
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Path to the engine registry YAML config.
    #[arg(long, default_value = "./engines.yaml")]
    engine_config: PathBuf,

    /// Scratch directory for local downloads/thumbnails.
    #[arg(long, default_value = "./work")]
    work_dir: PathBuf,

    /// Interval between janitor sweeps for stale `processing` entries.
    #[arg(long, default_value_t = 60)]
    janitor_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,swapforge=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("swapforge-worker-bin starting");

    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("creating data dir {}", args.data_dir.display()))?;
    std::fs::create_dir_all(&args.work_dir)
        .with_context(|| format!("creating work dir {}", args.work_dir.display()))?;

    let db = Arc::new(ForgeDb::open(&args.data_dir).context("opening store")?);
    let registry = EngineRegistry::load(&args.engine_config).context("loading engine registry")?;
    let pipelines = Arc::new(
        PipelineSet::build(&registry, db.clone(), args.work_dir.clone()).context("binding pipelines")?,
    );

    let deps = WorkerDeps { relational: db.clone(), kv: db.clone(), pipelines };
    let config = WorkerConfig { pop_timeout: Duration::from_secs(QUEUE_POP_TIMEOUT_SECS) };
    let shutdown = Arc::new(AtomicBool::new(false));

    let janitor_shutdown = shutdown.clone();
    let janitor_deps_relational = db.clone();
    let janitor_deps_kv = db.clone();
    let janitor_interval = Duration::from_secs(args.janitor_interval_secs);
    tokio::spawn(async move {
        while !janitor_shutdown.load(Ordering::Relaxed) {
            tokio::time::sleep(janitor_interval).await;
            let now = chrono::Utc::now().timestamp();
            let stale_threshold = (POLL_TIMEOUT_SECS as i64) * STALE_PROCESSING_MULTIPLIER;
            match swapforge_queue::sweep_stale(&*janitor_deps_kv, &*janitor_deps_relational, stale_threshold, now) {
                Ok(0) => {}
                Ok(n) => info!(re_enqueued = n, "janitor swept stale processing entries"),
                Err(e) => error!(error = %e, "janitor sweep failed"),
            }
        }
    });

    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received, finishing in-flight task then exiting");
        shutdown_signal.store(true, Ordering::Relaxed);
    });

    info!("worker ready");
    run_loop(&deps, &config, &shutdown).await;
    Ok(())
}
