//! Round-trip probe service seam and its `ping`-backed implementation
//!
//! The core only ever sees `ProbeService`: one burst of `packet_count` round
//! trips against a target, returning min/max/avg RTT or a typed error. The
//! default backend drives the host `ping` binary through `tokio::process`,
//! bounded by the configured call timeout. The timeout is always passed in
//! from configuration, never invented here.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::record::RttStats;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe to {target} timed out after {timeout_secs}s")]
    Timeout { target: String, timeout_secs: u64 },
    #[error("failed to launch probe command: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("probe to {target} failed: {detail}")]
    Failed { target: String, detail: String },
    #[error("unparseable probe output for {target}")]
    Parse { target: String },
}

#[async_trait]
pub trait ProbeService: Send + Sync {
    /// One connectivity check run before the session enters Running.
    /// A failure here is fatal for the whole session attempt.
    async fn check_ready(&self) -> Result<(), ProbeError>;

    /// Sends one burst of `packet_count` round trips to `target` and returns
    /// the burst's RTT summary.
    async fn probe(&self, target: &str, packet_count: u32) -> Result<RttStats, ProbeError>;
}

/// Probe backend that shells out to the system `ping` binary.
pub struct PingProber {
    timeout: Duration,
}

impl PingProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProbeService for PingProber {
    async fn check_ready(&self) -> Result<(), ProbeError> {
        // Loopback burst proves the binary exists and is runnable.
        self.probe("127.0.0.1", 1).await.map(|_| ())
    }

    async fn probe(&self, target: &str, packet_count: u32) -> Result<RttStats, ProbeError> {
        let mut command = Command::new("ping");
        command
            .arg("-n")
            .arg("-q")
            .arg("-c")
            .arg(packet_count.to_string())
            .arg(target)
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProbeError::Timeout {
                    target: target.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("ping exited with {}", output.status)
            } else {
                stderr
            };
            return Err(ProbeError::Failed {
                target: target.to_string(),
                detail,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_rtt_summary(&stdout).ok_or_else(|| ProbeError::Parse {
            target: target.to_string(),
        })
    }
}

/// Extracts the `min/avg/max` summary line from ping output.
///
/// Handles both the Linux (`rtt min/avg/max/mdev = ...`) and BSD/macOS
/// (`round-trip min/avg/max/stddev = ...`) forms.
pub(crate) fn parse_rtt_summary(output: &str) -> Option<RttStats> {
    let line = output.lines().rev().find(|l| l.contains("min/avg/max"))?;
    let values = line.split('=').nth(1)?.trim();
    let values = values.split_whitespace().next()?;
    let mut parts = values.split('/');
    let min_ms: f64 = parts.next()?.parse().ok()?;
    let avg_ms: f64 = parts.next()?.parse().ok()?;
    let max_ms: f64 = parts.next()?.parse().ok()?;
    Some(RttStats { min_ms, max_ms, avg_ms })
}
