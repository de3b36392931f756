//! Metrics sinks.
//!
//! A sink receives the counters of one analysis pass, ordered by key. Each
//! key maps onto four gauges (`smb_{create,open,modify,delete}_operations_total`)
//! labelled with `user` and `device`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use smblog_core::error::{Result, SmbLogError};
use smblog_core::models::UserMetrics;

/// Destination for the counters of an analysis pass.
pub trait MetricsSink: Send + Sync {
    fn name(&self) -> &str;

    /// Publish one snapshot of counters.
    fn publish(&self, metrics: &[UserMetrics]) -> Result<()>;
}

// ── LogSink ───────────────────────────────────────────────────────────────────

/// Logs every key through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn publish(&self, metrics: &[UserMetrics]) -> Result<()> {
        for m in metrics {
            tracing::info!(
                user = %m.user,
                device = %m.device,
                create = m.create,
                open = m.open,
                modify = m.modify,
                delete = m.delete,
                "smb operations"
            );
        }
        Ok(())
    }
}

// ── JsonLinesSink ─────────────────────────────────────────────────────────────

/// Appends one JSON object per gauge sample to a file.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for JsonLinesSink {
    fn name(&self) -> &str {
        "json-lines"
    }

    fn publish(&self, metrics: &[UserMetrics]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SmbLogError::Sink(format!("failed to open {}: {}", self.path.display(), e)))?;

        for m in metrics {
            for sample in m.gauges() {
                let json = serde_json::to_string(&sample)
                    .map_err(|e| SmbLogError::Sink(format!("failed to serialize sample: {}", e)))?;
                writeln!(file, "{}", json)?;
            }
        }

        tracing::debug!(path = %self.path.display(), keys = metrics.len(), "gauges appended");
        Ok(())
    }
}

// ── MemorySink ────────────────────────────────────────────────────────────────

/// Keeps every published snapshot in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    snapshots: Mutex<Vec<Vec<UserMetrics>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots published so far.
    pub fn count(&self) -> usize {
        self.snapshots.lock().len()
    }

    /// The most recent snapshot, if any.
    pub fn latest(&self) -> Option<Vec<UserMetrics>> {
        self.snapshots.lock().last().cloned()
    }

    /// Take every stored snapshot, leaving the sink empty.
    pub fn take_snapshots(&self) -> Vec<Vec<UserMetrics>> {
        std::mem::take(&mut *self.snapshots.lock())
    }
}

impl MetricsSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn publish(&self, metrics: &[UserMetrics]) -> Result<()> {
        self.snapshots.lock().push(metrics.to_vec());
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
