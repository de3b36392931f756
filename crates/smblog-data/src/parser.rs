//! Format detection and field extraction for logical records.
//!
//! Two unrelated layouts reach the parser:
//!
//! * **structured** – smbd debug output, a bracketed header plus an indented
//!   detail line:
//!   ```text
//!   [2025/09/09 13:01:08.165460, 2] ../../source3/smbd/open.c:1619(open_file)
//!     alice opened file docs/report.dwg read=Yes write=No (numopen=3)
//!   ```
//! * **audit** – a single `vfs_full_audit` syslog line:
//!   ```text
//!   Sep  9 13:01:08 nas01 smbd_audit: bob|10.0.0.1|host1|share1|unlink|ok|docs/old.txt
//!   ```
//!
//! A record is first classified into an [`SmbRecord`] variant, then turned
//! into a [`LogEvent`] by [`LogParser`]. Missing sub-fields degrade to empty
//! values; only a record matching neither layout is rejected.

use std::sync::OnceLock;

use regex::Regex;
use smblog_core::models::LogEvent;
use smblog_core::time_utils::{local_year, TimezoneHandler};
use tracing::debug;

use crate::classifier::{classify_audit, classify_structured};
use crate::reconstruct::AUDIT_MARKER;

/// At least one of these must appear in a structured record for it to be
/// treated as a file operation.
pub const OPERATION_KEYWORDS: &[&str] = &["open_file", "close_normal_file", "pwrite", "unlink", "rmdir"];

/// Audit lines need this many `|` fields to carry an operation token.
pub const MIN_AUDIT_FIELDS: usize = 5;

const AUDIT_USER_FIELD: usize = 0;
const AUDIT_OPERATION_FIELD: usize = 4;
const AUDIT_PATH_FIELD: usize = 6;

// ── Patterns ──────────────────────────────────────────────────────────────────

struct Patterns {
    header_timestamp: Regex,
    user: Regex,
    file_path: Regex,
    read_flag: Regex,
    write_flag: Regex,
    syslog_timestamp: Regex,
}

impl Patterns {
    fn compile() -> Self {
        Self {
            header_timestamp: Regex::new(r"\[(\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2})")
                .expect("regex is valid"),
            user: Regex::new(r"(?m)^[ \t]+(\S+) (?:opened|closed)\b").expect("regex is valid"),
            file_path: Regex::new(r"(?m)file (.*?)(?: read=| \(numopen|\s*$)").expect("regex is valid"),
            read_flag: Regex::new(r"\bread=(Yes|No)\b").expect("regex is valid"),
            write_flag: Regex::new(r"\bwrite=(Yes|No)\b").expect("regex is valid"),
            syslog_timestamp: Regex::new(r"^([A-Z][a-z]{2} +\d{1,2} \d{2}:\d{2}:\d{2})")
                .expect("regex is valid"),
        }
    }
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(Patterns::compile)
}

// ── SmbRecord ─────────────────────────────────────────────────────────────────

/// A logical record whose layout has been recognised, with its raw fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmbRecord<'a> {
    Structured(StructuredRecord<'a>),
    Audit(AuditRecord<'a>),
}

/// Fields of a smbd debug record. Everything except `text` is best effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredRecord<'a> {
    /// The whole record, header and detail.
    pub text: &'a str,
    /// `YYYY/MM/DD HH:MM:SS` from the header, sub-seconds dropped.
    pub timestamp: &'a str,
    pub user: &'a str,
    pub file_path: &'a str,
    /// `read=` flag; only extracted for `opened` records.
    pub read: Option<bool>,
    /// `write=` flag; only extracted for `opened` records.
    pub write: Option<bool>,
}

/// Fields of a `smbd_audit:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord<'a> {
    /// Year-less syslog prefix, when the line has one.
    pub syslog_timestamp: Option<&'a str>,
    /// The `|`-separated payload after the marker, trimmed.
    pub fields: Vec<&'a str>,
}

impl<'a> AuditRecord<'a> {
    pub fn user(&self) -> &'a str {
        self.fields.get(AUDIT_USER_FIELD).copied().unwrap_or_default()
    }

    /// The operation token, `None` when the line is too short to carry one.
    pub fn operation(&self) -> Option<&'a str> {
        if self.fields.len() < MIN_AUDIT_FIELDS {
            return None;
        }
        self.fields.get(AUDIT_OPERATION_FIELD).copied()
    }

    pub fn file_path(&self) -> &'a str {
        self.fields.get(AUDIT_PATH_FIELD).copied().unwrap_or_default()
    }
}

impl<'a> SmbRecord<'a> {
    /// Recognise the layout of `record`, or `None` when it is neither.
    ///
    /// The audit marker is checked first; a structured record must have a
    /// timestamped header *and* mention one of [`OPERATION_KEYWORDS`].
    pub fn classify(record: &'a str) -> Option<Self> {
        if let Some(marker_at) = record.find(AUDIT_MARKER) {
            return Some(SmbRecord::Audit(Self::split_audit(record, marker_at)));
        }

        let header = record.lines().next().unwrap_or_default();
        let timestamp = patterns()
            .header_timestamp
            .captures(header)?
            .get(1)?
            .as_str();

        if !OPERATION_KEYWORDS.iter().any(|kw| record.contains(kw)) {
            return None;
        }

        Some(SmbRecord::Structured(Self::extract_structured(record, timestamp)))
    }

    pub fn format_name(&self) -> &'static str {
        match self {
            SmbRecord::Structured(_) => "structured",
            SmbRecord::Audit(_) => "audit",
        }
    }

    fn split_audit(record: &'a str, marker_at: usize) -> AuditRecord<'a> {
        let prefix = record[..marker_at].trim_start();
        let payload = &record[marker_at + AUDIT_MARKER.len()..];

        let syslog_timestamp = patterns()
            .syslog_timestamp
            .captures(prefix)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());

        AuditRecord {
            syslog_timestamp,
            fields: payload.split('|').map(str::trim).collect(),
        }
    }

    fn extract_structured(record: &'a str, timestamp: &'a str) -> StructuredRecord<'a> {
        let p = patterns();
        let capture = |re: &Regex| -> Option<&'a str> {
            re.captures(record)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
        };

        let (read, write) = if record.contains("opened") {
            (
                capture(&p.read_flag).map(|v| v == "Yes"),
                capture(&p.write_flag).map(|v| v == "Yes"),
            )
        } else {
            (None, None)
        };

        StructuredRecord {
            text: record,
            timestamp,
            user: capture(&p.user).unwrap_or_default(),
            file_path: capture(&p.file_path).unwrap_or_default(),
            read,
            write,
        }
    }
}

// ── LogParser ─────────────────────────────────────────────────────────────────

/// Turns logical records into [`LogEvent`]s for one device.
#[derive(Debug, Clone)]
pub struct LogParser {
    device: String,
    timezone: TimezoneHandler,
    /// Pinned year for year-less syslog timestamps; `None` reads the local
    /// calendar at parse time.
    reference_year: Option<i32>,
}

impl LogParser {
    /// Parser for `device`, reading timestamps as UTC. Year-less syslog
    /// timestamps get the local calendar year at the time they are parsed.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            timezone: TimezoneHandler::default(),
            reference_year: None,
        }
    }

    /// Interpret timestamps in `timezone`.
    pub fn with_timezone(mut self, timezone: TimezoneHandler) -> Self {
        self.timezone = timezone;
        self
    }

    /// Pin the year attached to year-less syslog timestamps.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    /// The year year-less syslog timestamps get right now.
    pub fn reference_year(&self) -> i32 {
        self.reference_year.unwrap_or_else(local_year)
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Parse one logical record into a countable event.
    ///
    /// Returns `None` when the record is not a recognised file operation,
    /// including records whose action is unknown or missing. Close events
    /// are returned; they are simply not counted later.
    pub fn parse_record(&self, record: &str) -> Option<LogEvent> {
        let event = self.extract_event(record)?;
        if event.has_known_action() {
            Some(event)
        } else {
            debug!(
                action = ?event.action,
                "dropping record without a known action: {}",
                preview(record)
            );
            None
        }
    }

    /// Parse every record, keeping only countable events, in input order.
    pub fn parse_records<S: AsRef<str>>(&self, records: &[S]) -> Vec<LogEvent> {
        records
            .iter()
            .filter_map(|r| self.parse_record(r.as_ref()))
            .collect()
    }

    /// Extract an event from any record matching one of the two layouts.
    ///
    /// Unlike [`parse_record`](Self::parse_record) this keeps events whose
    /// action is unknown or unset, so callers can inspect malformed input.
    /// `None` only when neither layout matches.
    pub fn extract_event(&self, record: &str) -> Option<LogEvent> {
        let Some(classified) = SmbRecord::classify(record) else {
            debug!("unrecognised record: {}", preview(record));
            return None;
        };

        let mut event = LogEvent::new(self.device.clone());

        match classified {
            SmbRecord::Structured(rec) => {
                event.user = rec.user.to_string();
                event.file_path = rec.file_path.to_string();
                event.timestamp = self.timezone.parse_samba_timestamp(rec.timestamp);
                event.action = Some(classify_structured(rec.text));
            }
            SmbRecord::Audit(rec) => {
                event.user = rec.user().to_string();
                event.file_path = rec.file_path().to_string();
                event.timestamp = rec.syslog_timestamp.and_then(|ts| {
                    self.timezone
                        .parse_syslog_timestamp(ts, self.reference_year())
                });
                event.action = rec.operation().map(classify_audit);
            }
        }

        Some(event)
    }
}

/// First line of a record, cut to 100 characters, for log messages.
fn preview(record: &str) -> String {
    record
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(100)
        .collect()
}

/// Convenience wrapper over [`LogParser::parse_record`] with UTC timestamps.
pub fn parse_record(record: &str, device: &str) -> Option<LogEvent> {
    LogParser::new(device).parse_record(record)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
