//! Session configuration
//!
//! Everything the excluded CLI layer would own arrives here as plain
//! parameters: a TOML file with `[probe]`, `[monitor]` and `[store]`
//! sections, every field optional with a concrete default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::runner::ChunkFailurePolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub probe: ProbeConfig,
    pub monitor: MonitorConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Targets to probe. Duplicates are allowed and probed independently.
    pub targets: Vec<String>,
    /// Total packets per target.
    pub packet_count: u32,
    /// Upper bound on packets per probe service call.
    pub chunk_size: u32,
    /// Cap on concurrently probed targets.
    pub worker_limit: usize,
    /// Timeout for one probe service call, passed through to the backend.
    pub timeout_secs: u64,
    pub on_chunk_failure: ChunkFailurePolicy,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            packet_count: 5,
            chunk_size: 10,
            worker_limit: 10,
            timeout_secs: 60,
            on_chunk_failure: ChunkFailurePolicy::Continue,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub sample_interval_secs: u64,
    /// Monitoring window; the loop self-terminates once it elapses.
    pub max_duration_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval_secs: 1,
            max_duration_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// Most records the writer appends in one write.
    pub drain_batch: usize,
    /// Pause before retrying an unwritable store.
    pub flush_retry_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("netpulse_telemetry.csv"),
            drain_batch: 64,
            flush_retry_secs: 1,
        }
    }
}

impl SessionConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: SessionConfig = toml::from_str(&content).context("invalid session config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.probe.chunk_size == 0 {
            bail!("probe.chunk_size must be greater than zero");
        }
        if !self.probe.targets.is_empty() && self.probe.packet_count == 0 {
            bail!("probe.packet_count must be greater than zero");
        }
        if self.probe.targets.iter().any(|t| t.contains(',') || t.is_empty()) {
            bail!("probe targets must be non-empty and free of commas");
        }
        if self.monitor.enabled && self.monitor.sample_interval_secs == 0 {
            bail!("monitor.sample_interval_secs must be greater than zero");
        }
        if self.store.drain_batch == 0 {
            bail!("store.drain_batch must be greater than zero");
        }
        if self.probe.targets.is_empty() && !self.monitor.enabled {
            bail!("nothing to do: no probe targets and monitoring disabled");
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.timeout_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.sample_interval_secs)
    }

    pub fn max_monitor_duration(&self) -> Duration {
        Duration::from_secs(self.monitor.max_duration_secs)
    }

    pub fn flush_retry(&self) -> Duration {
        Duration::from_secs(self.store.flush_retry_secs)
    }
}
