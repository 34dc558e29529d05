//! swapforge-api — the JSON-RPC task surface binary.
//!
//! Startup sequence:
//!   1. Open the persistent store
//!   2. Wire up an `Identity` boundary (see `PassthroughIdentity` below)
//!   3. Start the JSON-RPC 2.0 server and run until signalled

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use swapforge_core::error::ForgeError;
use swapforge_core::types::UserId;
use swapforge_rpc::{Identity, RpcServer, RpcServerState};
use swapforge_store::ForgeDb;

#[derive(Parser, Debug)]
#[command(name = "swapforge-api", version, about = "SwapForge task API — JSON-RPC facade")]
struct Args {
    /// Directory for the persistent store.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8787")]
    rpc_addr: SocketAddr,
}

/// Treats the bearer token as the caller's hex-encoded user id directly.
///
/// JWT issuance and validation are out of scope for this core (§1); a
/// production deployment terminates auth in front of this facade and
/// forwards the already-resolved user id as the bearer value. This is the
/// concrete `Identity` a standalone binary needs to do anything at all.
struct PassthroughIdentity;

impl Identity for PassthroughIdentity {
    fn resolve(&self, token: &str) -> Result<UserId, ForgeError> {
        if token.trim().is_empty() {
            return Err(ForgeError::Unauthenticated);
        }
        Ok(UserId::from_hex(token.to_string()))
    }
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
    info!("swapforge-api starting");

    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("creating data dir {}", args.data_dir.display()))?;
    let db = Arc::new(ForgeDb::open(&args.data_dir).context("opening store")?);

    let state = Arc::new(RpcServerState {
        relational: db.clone(),
        kv: db,
        identity: Arc::new(PassthroughIdentity),
    });

    let handle = RpcServer::new(state).start(args.rpc_addr).await.context("starting RPC server")?;
    info!("swapforge-api ready");

    handle.stopped().await;
    Ok(())
}
