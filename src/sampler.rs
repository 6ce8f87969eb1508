//! Host resource sampling behind the `SystemSampler` seam
//!
//! The production implementation reads CPU, memory and disk figures through
//! `sysinfo`. Sampling is best-effort and infallible: anything the host
//! refuses to report comes back as zero so the monitoring loop never has to
//! handle an error.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sysinfo::{Disks, System};
use tracing::debug;

use crate::record::SystemSample;

/// Delay between CPU refreshes so the usage delta has something to measure.
const CPU_SETTLE: Duration = Duration::from_millis(200);

#[async_trait]
pub trait SystemSampler: Send + Sync {
    /// Takes one best-effort snapshot. May block briefly while CPU usage
    /// settles; never fails.
    async fn sample(&self) -> SystemSample;
}

/// `sysinfo`-backed sampler.
pub struct SysinfoSampler;

#[async_trait]
impl SystemSampler for SysinfoSampler {
    async fn sample(&self) -> SystemSample {
        let mut sys = System::new_all();
        sys.refresh_all();

        // CPU usage is a delta between two refreshes.
        tokio::time::sleep(CPU_SETTLE).await;
        sys.refresh_cpu_usage();
        let cpu_percent = sys.global_cpu_info().cpu_usage();

        let total = sys.total_memory();
        let available = sys.available_memory();
        let used = total.saturating_sub(available);
        let mem_percent = if total > 0 {
            used as f32 / total as f32 * 100.0
        } else {
            0.0
        };
        let mem_used_mb = used / (1024 * 1024);
        let mem_free_mb = available / (1024 * 1024);

        let (disk_percent, disk_free_gb) = root_disk_usage();

        debug!(cpu_percent, mem_percent, disk_percent, "system sample taken");

        SystemSample {
            timestamp: Utc::now(),
            cpu_percent,
            mem_percent,
            mem_used_mb,
            mem_free_mb,
            disk_percent,
            disk_free_gb,
        }
    }
}

/// Usage of the root filesystem, falling back to the first listed disk.
fn root_disk_usage() -> (f32, f64) {
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first());

    match root {
        Some(disk) if disk.total_space() > 0 => {
            let total = disk.total_space();
            let free = disk.available_space();
            let used = total.saturating_sub(free);
            let percent = used as f64 / total as f64 * 100.0;
            (percent as f32, free as f64 / (1024.0 * 1024.0 * 1024.0))
        }
        _ => (0.0, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sample_reports_sane_values() {
        let sample = SysinfoSampler.sample().await;
        assert!(sample.cpu_percent >= 0.0);
        assert!((0.0..=100.0).contains(&sample.mem_percent));
        assert!(sample.mem_used_mb + sample.mem_free_mb > 0);
        assert!(sample.disk_percent >= 0.0);
    }
}
