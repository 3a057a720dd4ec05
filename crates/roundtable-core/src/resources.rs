//! Process resource sampling.
//!
//! Snapshots carry peak resident memory and the CPU share used since the
//! previous snapshot, read from `getrusage(RUSAGE_SELF)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Resource usage at one labelled checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub memory_mb: f64,
    pub cpu_percent: f64,
    pub timestamp: DateTime<Utc>,
}

/// Produces snapshots relative to the previous one.
#[derive(Debug)]
pub struct ResourceSampler {
    last_wall: Instant,
    last_cpu: Duration,
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler {
    /// Creates a sampler; the first snapshot measures CPU from this point.
    pub fn new() -> Self {
        Self {
            last_wall: Instant::now(),
            last_cpu: usage().map_or(Duration::ZERO, |u| u.cpu),
        }
    }

    /// Takes a snapshot and moves the CPU baseline forward.
    pub fn snapshot(&mut self) -> ResourceSnapshot {
        let now = Instant::now();
        let Some(current) = usage() else {
            return ResourceSnapshot {
                memory_mb: 0.0,
                cpu_percent: 0.0,
                timestamp: Utc::now(),
            };
        };

        let wall = now.duration_since(self.last_wall).as_secs_f64();
        let cpu = current.cpu.saturating_sub(self.last_cpu).as_secs_f64();
        let cpu_percent = if wall > 0.0 { cpu / wall * 100.0 } else { 0.0 };

        self.last_wall = now;
        self.last_cpu = current.cpu;

        ResourceSnapshot {
            memory_mb: current.max_rss_bytes as f64 / (1024.0 * 1024.0),
            cpu_percent: round2(cpu_percent),
            timestamp: Utc::now(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

struct Usage {
    max_rss_bytes: u64,
    cpu: Duration,
}

#[cfg(unix)]
fn usage() -> Option<Usage> {
    use nix::sys::resource::{UsageWho, getrusage};
    use nix::sys::time::TimeValLike;

    let usage = getrusage(UsageWho::RUSAGE_SELF).ok()?;
    let micros = usage.user_time().num_microseconds() + usage.system_time().num_microseconds();
    let max_rss = u64::try_from(usage.max_rss()).unwrap_or(0);

    // Linux reports kilobytes, macOS bytes.
    let max_rss_bytes = if cfg!(target_os = "macos") {
        max_rss
    } else {
        max_rss * 1024
    };

    Some(Usage {
        max_rss_bytes,
        cpu: Duration::from_micros(u64::try_from(micros).unwrap_or(0)),
    })
}

#[cfg(not(unix))]
fn usage() -> Option<Usage> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_values_are_sane() {
        let mut sampler = ResourceSampler::new();
        let mut x = 0u64;
        for i in 0..200_000u64 {
            x = x.wrapping_add(i * i);
        }
        std::hint::black_box(x);

        let snap = sampler.snapshot();
        assert!(snap.cpu_percent >= 0.0);
        assert!(snap.memory_mb >= 0.0);
        #[cfg(unix)]
        assert!(snap.memory_mb > 0.0);
    }

    #[test]
    fn test_snapshot_serializes_with_expected_keys() {
        let mut sampler = ResourceSampler::default();
        let json = serde_json::to_value(sampler.snapshot()).unwrap();
        assert!(json.get("memory_mb").is_some());
        assert!(json.get("cpu_percent").is_some());
        assert!(json.get("timestamp").is_some());
    }
}
