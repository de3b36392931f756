//! Folding of classified events into per-(user, device) counters.

use std::collections::BTreeMap;

use serde::Serialize;
use smblog_core::models::{metrics_key, LogEvent, UserMetrics};

/// Counter map keyed by `user|device`, iterated in key order.
pub type MetricsMap = BTreeMap<String, UserMetrics>;

// ── OperationTotals ───────────────────────────────────────────────────────────

/// Counter sums across every key of a [`MetricsMap`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationTotals {
    pub create: u64,
    pub open: u64,
    pub modify: u64,
    pub delete: u64,
    /// Number of distinct (user, device) keys.
    pub keys: usize,
}

impl OperationTotals {
    pub fn total(&self) -> u64 {
        self.create + self.open + self.modify + self.delete
    }
}

// ── OperationAggregator ───────────────────────────────────────────────────────

/// Stateless aggregation helpers.
pub struct OperationAggregator;

impl OperationAggregator {
    /// Fold `events` into a fresh counter map.
    ///
    /// Events with an unset, unknown or close action are skipped. The result
    /// depends only on the multiset of events, never on their order.
    pub fn aggregate<'a, I>(events: I) -> MetricsMap
    where
        I: IntoIterator<Item = &'a LogEvent>,
    {
        let mut metrics = MetricsMap::new();
        for event in events {
            Self::fold(&mut metrics, event);
        }
        metrics
    }

    /// Fold one event into `metrics`, creating its key on first use.
    ///
    /// Returns `true` when a counter was incremented.
    pub fn fold(metrics: &mut MetricsMap, event: &LogEvent) -> bool {
        let Some(action) = event.counted_action() else {
            return false;
        };

        metrics
            .entry(metrics_key(&event.user, &event.device))
            .or_insert_with(|| UserMetrics::new(event.user.clone(), event.device.clone()))
            .record(action);
        true
    }

    /// Sum the counters of every key.
    pub fn calculate_totals<'a, I>(metrics: I) -> OperationTotals
    where
        I: IntoIterator<Item = &'a UserMetrics>,
    {
        metrics
            .into_iter()
            .fold(OperationTotals::default(), |mut totals, m| {
                totals.create += m.create;
                totals.open += m.open;
                totals.modify += m.modify;
                totals.delete += m.delete;
                totals.keys += 1;
                totals
            })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
