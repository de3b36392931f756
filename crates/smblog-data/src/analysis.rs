//! Main analysis pass.
//!
//! Regroups raw lines, parses each logical record and folds the events into
//! counters, returning an [`AnalysisResult`] ready for the metrics sinks.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use smblog_core::models::{ActionKind, LogEvent, UserMetrics};
use tracing::{debug, info};

use crate::aggregator::{OperationAggregator, OperationTotals};
use crate::parser::LogParser;
use crate::reconstruct::{reconstruct, Framing};

// ── Public types ──────────────────────────────────────────────────────────────

/// Counts describing what one pass saw and kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    /// Physical lines handed in.
    pub raw_lines: usize,
    /// Logical records after regrouping.
    pub records: usize,
    /// Records matching neither log layout.
    pub unrecognized: usize,
    /// Recognised records whose action was unknown or unset.
    pub unclassified: usize,
    /// Events with a known action, close included.
    pub events: usize,
    /// Events that reached a counter.
    pub counted: usize,
    /// Event count per action, close included.
    pub by_action: BTreeMap<ActionKind, usize>,
}

impl AnalysisStats {
    /// Records that produced no event.
    pub fn skipped(&self) -> usize {
        self.unrecognized + self.unclassified
    }
}

/// The complete output of [`analyze`].
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    pub device: String,
    /// Counters, one per `user|device`, ordered by key.
    pub metrics: Vec<UserMetrics>,
    pub totals: OperationTotals,
    pub stats: AnalysisStats,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full pass over `lines`.
///
/// 1. Regroup lines into logical records using `framing`.
/// 2. Parse each record with `parser`.
/// 3. Fold the events into per-(user, device) counters.
pub fn analyze<S: AsRef<str>>(lines: &[S], framing: Framing, parser: &LogParser) -> AnalysisResult {
    let records = reconstruct(lines, framing);

    let mut stats = AnalysisStats {
        raw_lines: lines.len(),
        records: records.len(),
        ..Default::default()
    };

    let events = collect_events(&records, parser, &mut stats);

    let mut metrics_map = BTreeMap::new();
    for event in &events {
        if OperationAggregator::fold(&mut metrics_map, event) {
            stats.counted += 1;
        }
    }
    let metrics: Vec<UserMetrics> = metrics_map.into_values().collect();
    let totals = OperationAggregator::calculate_totals(&metrics);

    info!(
        device = parser.device(),
        raw_lines = stats.raw_lines,
        records = stats.records,
        events = stats.events,
        skipped = stats.skipped(),
        keys = totals.keys,
        "analysis pass complete"
    );

    AnalysisResult {
        generated_at: Utc::now().to_rfc3339(),
        device: parser.device().to_string(),
        metrics,
        totals,
        stats,
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Parse every record, keeping events with a known action and tallying the
/// rest into `stats`.
fn collect_events(records: &[String], parser: &LogParser, stats: &mut AnalysisStats) -> Vec<LogEvent> {
    let mut events = Vec::with_capacity(records.len());

    for record in records {
        let Some(event) = parser.extract_event(record) else {
            stats.unrecognized += 1;
            continue;
        };

        match event.action {
            Some(action) if action != ActionKind::Unknown => {
                *stats.by_action.entry(action).or_insert(0) += 1;
                stats.events += 1;
                events.push(event);
            }
            _ => {
                debug!(user = %event.user, action = ?event.action, "record without a known action");
                stats.unclassified += 1;
            }
        }
    }

    events
}

// ── Tests ─────────────────────────────────────────────────────────────────────
