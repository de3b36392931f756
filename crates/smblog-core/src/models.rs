use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic file operation recognised in a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Open,
    Modify,
    Delete,
    /// Classified but never tallied.
    Close,
    /// No rule matched. Events carrying this never reach the counters.
    Unknown,
}

impl ActionKind {
    /// Every action that owns a counter in [`UserMetrics`].
    pub const COUNTED: [ActionKind; 4] = [
        ActionKind::Create,
        ActionKind::Open,
        ActionKind::Modify,
        ActionKind::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Open => "open",
            ActionKind::Modify => "modify",
            ActionKind::Delete => "delete",
            ActionKind::Close => "close",
            ActionKind::Unknown => "unknown",
        }
    }

    /// `true` for the four actions that contribute to [`UserMetrics`].
    pub fn is_counted(&self) -> bool {
        Self::COUNTED.contains(self)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recognised file-system operation extracted from a logical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Acting principal; empty when it could not be extracted.
    #[serde(default)]
    pub user: String,
    /// Caller-supplied source identity, identical for every event of a pass.
    #[serde(default)]
    pub device: String,
    /// Best-effort file path; may be empty.
    #[serde(default)]
    pub file_path: String,
    /// Classified operation. `None` when the record was too malformed to
    /// carry an operation token at all.
    pub action: Option<ActionKind>,
    /// Event time as written in the log, `None` when absent or unparseable.
    pub timestamp: Option<DateTime<Utc>>,
    /// When this process built the event.
    pub created_at: DateTime<Utc>,
}

impl LogEvent {
    /// Create an empty event for `device`, stamped with the current time.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            user: String::new(),
            device: device.into(),
            file_path: String::new(),
            action: None,
            timestamp: None,
            created_at: Utc::now(),
        }
    }

    /// The action if it is one that gets counted, `None` otherwise.
    pub fn counted_action(&self) -> Option<ActionKind> {
        self.action.filter(ActionKind::is_counted)
    }

    /// `true` when the action is known (anything but unset or `Unknown`).
    pub fn has_known_action(&self) -> bool {
        matches!(self.action, Some(a) if a != ActionKind::Unknown)
    }
}

/// Build the aggregation key for a (user, device) pair.
pub fn metrics_key(user: &str, device: &str) -> String {
    format!("{}|{}", user, device)
}

/// Operation counters for one (user, device) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetrics {
    pub user: String,
    pub device: String,
    pub create: u64,
    pub open: u64,
    pub modify: u64,
    pub delete: u64,
}

impl UserMetrics {
    pub fn new(user: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            device: device.into(),
            ..Default::default()
        }
    }

    /// `user|device`.
    pub fn key(&self) -> String {
        metrics_key(&self.user, &self.device)
    }

    /// Bump the counter for `action`. Close and unknown are ignored.
    pub fn record(&mut self, action: ActionKind) {
        match action {
            ActionKind::Create => self.create += 1,
            ActionKind::Open => self.open += 1,
            ActionKind::Modify => self.modify += 1,
            ActionKind::Delete => self.delete += 1,
            ActionKind::Close | ActionKind::Unknown => {}
        }
    }

    /// Sum of all four counters.
    pub fn total(&self) -> u64 {
        self.create + self.open + self.modify + self.delete
    }

    /// The four gauge samples a metrics collector receives for this key.
    pub fn gauges(&self) -> [GaugeSample; 4] {
        let sample = |name: &'static str, value: u64| GaugeSample {
            name,
            user: self.user.clone(),
            device: self.device.clone(),
            value,
        };
        [
            sample(CREATE_GAUGE, self.create),
            sample(OPEN_GAUGE, self.open),
            sample(MODIFY_GAUGE, self.modify),
            sample(DELETE_GAUGE, self.delete),
        ]
    }
}

pub const CREATE_GAUGE: &str = "smb_create_operations_total";
pub const OPEN_GAUGE: &str = "smb_open_operations_total";
pub const MODIFY_GAUGE: &str = "smb_modify_operations_total";
pub const DELETE_GAUGE: &str = "smb_delete_operations_total";

/// One labelled gauge value handed to a metrics sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GaugeSample {
    pub name: &'static str,
    pub user: String,
    pub device: String,
    pub value: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── ActionKind ────────────────────────────────────────────────────────────

    #[test]
    fn test_action_kind_counted() {
        assert!(ActionKind::Create.is_counted());
        assert!(ActionKind::Open.is_counted());
        assert!(ActionKind::Modify.is_counted());
        assert!(ActionKind::Delete.is_counted());
        assert!(!ActionKind::Close.is_counted());
        assert!(!ActionKind::Unknown.is_counted());
    }

    #[test]
    fn test_action_kind_serde_lowercase() {
        let json = serde_json::to_string(&ActionKind::Modify).unwrap();
        assert_eq!(json, "\"modify\"");
        let back: ActionKind = serde_json::from_str("\"delete\"").unwrap();
        assert_eq!(back, ActionKind::Delete);
    }

    #[test]
    fn test_action_kind_display() {
        assert_eq!(ActionKind::Close.to_string(), "close");
    }

    // ── LogEvent ──────────────────────────────────────────────────────────────

    #[test]
    fn test_log_event_new_is_unset() {
        let event = LogEvent::new("nas01");
        assert_eq!(event.device, "nas01");
        assert!(event.user.is_empty());
        assert!(event.action.is_none());
        assert!(event.timestamp.is_none());
        assert!(event.counted_action().is_none());
        assert!(!event.has_known_action());
    }

    #[test]
    fn test_log_event_counted_action_filters_close() {
        let mut event = LogEvent::new("nas01");
        event.action = Some(ActionKind::Close);
        assert!(event.has_known_action());
        assert!(event.counted_action().is_none());

        event.action = Some(ActionKind::Open);
        assert_eq!(event.counted_action(), Some(ActionKind::Open));
    }

    // ── UserMetrics ───────────────────────────────────────────────────────────

    #[test]
    fn test_metrics_key_allows_empty_user() {
        assert_eq!(metrics_key("", "nas01"), "|nas01");
        assert_eq!(metrics_key("alice", "nas01"), "alice|nas01");
    }

    #[test]
    fn test_user_metrics_record() {
        let mut m = UserMetrics::new("alice", "nas01");
        m.record(ActionKind::Create);
        m.record(ActionKind::Open);
        m.record(ActionKind::Open);
        m.record(ActionKind::Modify);
        m.record(ActionKind::Delete);
        m.record(ActionKind::Close);
        m.record(ActionKind::Unknown);

        assert_eq!(m.create, 1);
        assert_eq!(m.open, 2);
        assert_eq!(m.modify, 1);
        assert_eq!(m.delete, 1);
        assert_eq!(m.total(), 5);
        assert_eq!(m.key(), "alice|nas01");
    }

    #[test]
    fn test_user_metrics_gauges() {
        let mut m = UserMetrics::new("bob", "nas02");
        m.record(ActionKind::Delete);
        let gauges = m.gauges();

        assert_eq!(gauges[0].name, "smb_create_operations_total");
        assert_eq!(gauges[3].name, "smb_delete_operations_total");
        assert_eq!(gauges[3].value, 1);
        assert!(gauges.iter().all(|g| g.user == "bob" && g.device == "nas02"));
    }
}
