//! Operation classification.
//!
//! Both log formats map onto [`ActionKind`] through small ordered tables.
//! The first matching entry wins, so the order of [`STRUCTURED_RULES`] is
//! part of its contract: an `opened` record always carries a `write=` flag,
//! and the open/create/modify rules must see it before the generic write
//! rule does.

use std::sync::OnceLock;

use regex::Regex;
use smblog_core::models::ActionKind;

// ── Structured (two-line) records ─────────────────────────────────────────────

/// One row of a first-match-wins decision table over record text.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub action: ActionKind,
}

/// Decision table for smbd debug records, highest priority first.
pub const STRUCTURED_RULES: &[Rule] = &[
    Rule {
        name: "opened read+write",
        matches: opened_read_write,
        action: ActionKind::Modify,
    },
    Rule {
        name: "opened write",
        matches: opened_write,
        action: ActionKind::Create,
    },
    Rule {
        name: "opened",
        matches: opened,
        action: ActionKind::Open,
    },
    Rule {
        name: "write",
        matches: writes,
        action: ActionKind::Modify,
    },
    Rule {
        name: "unlink/rmdir",
        matches: removes,
        action: ActionKind::Delete,
    },
    Rule {
        name: "closed",
        matches: closed,
        action: ActionKind::Close,
    },
];

fn opened_read_write(text: &str) -> bool {
    text.contains("opened") && text.contains("read=Yes") && text.contains("write=Yes")
}

fn opened_write(text: &str) -> bool {
    text.contains("opened") && text.contains("write=Yes")
}

fn opened(text: &str) -> bool {
    text.contains("opened")
}

fn writes(text: &str) -> bool {
    static WRITE_WORD: OnceLock<Regex> = OnceLock::new();
    let word = WRITE_WORD.get_or_init(|| Regex::new(r"\bwrite\b").expect("regex is valid"));
    text.contains("pwrite") || word.is_match(text)
}

fn removes(text: &str) -> bool {
    text.contains("unlink") || text.contains("rmdir")
}

fn closed(text: &str) -> bool {
    text.contains("closed")
}

/// Classify a structured record by its full text.
pub fn classify_structured(text: &str) -> ActionKind {
    matching_rule(text)
        .map(|rule| rule.action)
        .unwrap_or(ActionKind::Unknown)
}

/// The rule that decides `text`, if any.
pub fn matching_rule(text: &str) -> Option<&'static Rule> {
    STRUCTURED_RULES.iter().find(|rule| (rule.matches)(text))
}

// ── Audit (single-line) records ───────────────────────────────────────────────

/// `vfs_full_audit` operation tokens, matched exactly and case-sensitively.
pub const AUDIT_OPERATIONS: &[(&str, ActionKind)] = &[
    ("open", ActionKind::Open),
    ("pwrite", ActionKind::Modify),
    ("unlink", ActionKind::Delete),
    ("rmdir", ActionKind::Delete),
    ("mkdir", ActionKind::Create),
    ("rename", ActionKind::Modify),
    ("close", ActionKind::Close),
];

/// Classify an audit record by its operation token.
pub fn classify_audit(operation: &str) -> ActionKind {
    AUDIT_OPERATIONS
        .iter()
        .find(|(token, _)| *token == operation)
        .map(|(_, action)| *action)
        .unwrap_or(ActionKind::Unknown)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
