//! Analysis runner.
//!
//! A pass fetches lines from the configured [`LineSource`] on a blocking
//! task, runs [`analyze`] over them and publishes the counters to every
//! [`MetricsSink`]. [`Runner::start`] repeats passes on an interval in a tokio
//! task and streams each [`AnalysisResult`] through an `mpsc` channel.

use std::sync::Arc;
use std::time::Duration;

use smblog_core::error::{Result, SmbLogError};
use smblog_data::analysis::{analyze, AnalysisResult};
use smblog_data::parser::LogParser;
use tokio::sync::mpsc;
use tokio::time;

use crate::sink::MetricsSink;
use crate::source::LineSource;

/// Maximum number of fetch attempts per pass.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Shortest interval accepted by [`Runner::start`].
const MIN_INTERVAL: Duration = Duration::from_millis(10);

// ── Runner ────────────────────────────────────────────────────────────────────

pub struct Runner {
    source: Arc<dyn LineSource>,
    sinks: Vec<Arc<dyn MetricsSink>>,
    parser: LogParser,
}

impl Runner {
    pub fn new(source: Arc<dyn LineSource>, parser: LogParser) -> Self {
        Self {
            source,
            sinks: Vec::new(),
            parser,
        }
    }

    /// Add a sink that receives the counters of every pass.
    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Run a single pass.
    ///
    /// Fails when the source could not be read after every retry, or when a
    /// sink rejected the counters. Every sink is tried even if an earlier
    /// one fails; the first error is returned.
    pub async fn run_once(&self) -> Result<AnalysisResult> {
        let lines = self.fetch_with_retry().await?;
        let result = analyze(&lines, self.source.framing(), &self.parser);
        self.publish(&result)?;
        Ok(result)
    }

    /// Start repeating passes every `interval`.
    ///
    /// The first pass runs immediately. Failed passes are logged and the loop
    /// carries on. The loop exits once the receiver is dropped. Intervals
    /// shorter than 10 ms are raised to 10 ms.
    pub fn start(self, interval: Duration) -> (mpsc::Receiver<AnalysisResult>, RunnerHandle) {
        let (tx, rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            self.run_loop(interval, tx).await;
        });

        (rx, RunnerHandle { handle })
    }

    // ── Private implementation ────────────────────────────────────────────

    async fn run_loop(self, interval: Duration, tx: mpsc::Sender<AnalysisResult>) {
        let mut ticker = time::interval(interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if tx.is_closed() {
                tracing::debug!("runner channel closed; exiting loop");
                break;
            }

            match self.run_once().await {
                Ok(result) => {
                    if tx.send(result).await.is_err() {
                        tracing::debug!("runner receiver dropped; exiting loop");
                        break;
                    }
                }
                Err(e) => tracing::warn!(source = %self.source.name(), error = %e, "analysis pass failed"),
            }
        }
    }

    /// Fetch on a blocking task, retrying with back-off 0 ms → 100 ms → 200 ms.
    async fn fetch_with_retry(&self) -> Result<Vec<String>> {
        let mut last_err = None;

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                let sleep_ms = u64::from(attempt) * 100;
                tracing::debug!(attempt, sleep_ms, "retrying fetch after back-off");
                time::sleep(Duration::from_millis(sleep_ms)).await;
            }

            let source = Arc::clone(&self.source);
            let fetched = tokio::task::spawn_blocking(move || source.fetch())
                .await
                .map_err(|e| SmbLogError::Other(anyhow::anyhow!("fetch task failed: {}", e)))
                .and_then(|r| r);

            match fetched {
                Ok(lines) => {
                    tracing::debug!(source = %self.source.name(), lines = lines.len(), "fetched lines");
                    return Ok(lines);
                }
                Err(e) => {
                    tracing::warn!(attempt, source = %self.source.name(), error = %e, "fetch attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| SmbLogError::Config("no fetch attempted".to_string())))
    }

    fn publish(&self, result: &AnalysisResult) -> Result<()> {
        let mut first_err = None;

        for sink in &self.sinks {
            if let Err(e) = sink.publish(&result.metrics) {
                tracing::warn!(sink = sink.name(), error = %e, "publish failed");
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ── RunnerHandle ──────────────────────────────────────────────────────────────

/// Handle to the background task spawned by [`Runner::start`].
pub struct RunnerHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl RunnerHandle {
    /// Immediately abort the loop.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
