//! netpulse - time-bounded system telemetry and RTT probe session recorder
//!
//! Runs one bounded session: a monitoring loop samples host CPU/memory/disk
//! usage at a fixed interval while a worker pool probes a list of targets in
//! bounded chunks, and a single persistence writer appends every observation
//! to an append-only CSV store. The session terminates deterministically once
//! all probe work is done and the monitoring window has closed.

mod config;
mod monitor;
mod pool;
mod probe;
mod queue;
mod record;
mod runner;
mod sampler;
mod session;
mod signal;
#[cfg(test)]
mod testutil;
mod writer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::SessionConfig;
use crate::session::SessionController;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("netpulse=info")),
        )
        .init();

    // The only command-line surface: an optional config file path.
    let config = match std::env::args_os().nth(1) {
        Some(path) => SessionConfig::load(&PathBuf::from(path))
            .await
            .context("failed to load session config")?,
        None => {
            let config = SessionConfig::default();
            config
                .validate()
                .context("default session config is not runnable")?;
            config
        }
    };

    info!(store = %config.store.path.display(), "netpulse starting");

    let controller = SessionController::with_default_collaborators(config);
    let report = controller.run().await.context("session failed")?;

    info!(
        report = %serde_json::to_string(&report).unwrap_or_default(),
        "session report"
    );
    Ok(())
}
