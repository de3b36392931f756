//! Regrouping of raw lines into logical records.
//!
//! smbd writes each debug event as a bracketed header line followed by an
//! indented detail line, while `smbd_audit:` lines stand on their own. How
//! the physical lines reach us decides how they are stitched back together,
//! see [`Framing`].

use serde::{Deserialize, Serialize};

/// Substring identifying a single-line `vfs_full_audit` record.
pub const AUDIT_MARKER: &str = "smbd_audit:";

/// How the raw lines were delivered, which selects the regrouping strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Lines read straight from a log file. A `[` line opens a record that
    /// absorbs every following line up to the next `[` line.
    DirectRead,
    /// Lines returned one by one by a query backend. A `[` line is paired
    /// with exactly the next line when that line is indented.
    Reassembly,
}

/// Regroup `lines` into logical records using `framing`.
pub fn reconstruct<S: AsRef<str>>(lines: &[S], framing: Framing) -> Vec<String> {
    match framing {
        Framing::DirectRead => group_direct(lines),
        Framing::Reassembly => pair_reassembled(lines),
    }
}

fn is_header(line: &str) -> bool {
    line.starts_with('[')
}

fn is_audit(line: &str) -> bool {
    line.contains(AUDIT_MARKER)
}

fn is_detail(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

/// Direct-read strategy.
///
/// Audit lines are emitted immediately and leave any open record untouched.
/// Lines seen before the first header have nothing to attach to and are
/// dropped.
fn group_direct<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut records = Vec::new();
    let mut current: Option<String> = None;

    for line in lines {
        let line = line.as_ref();

        if is_audit(line) {
            records.push(line.to_string());
            continue;
        }

        if is_header(line) {
            if let Some(done) = current.take() {
                records.push(done);
            }
            current = Some(line.to_string());
        } else if let Some(open) = current.as_mut() {
            open.push('\n');
            open.push_str(line);
        }
    }

    if let Some(done) = current {
        records.push(done);
    }

    records
}

/// Reassembly strategy.
fn pair_reassembled<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut records = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].as_ref();

        if is_header(line) && !is_audit(line) {
            if let Some(next) = lines.get(i + 1) {
                let next: &str = next.as_ref();
                if is_detail(next) && !is_audit(next) {
                    records.push(format!("{}\n{}", line, next));
                    i += 2;
                    continue;
                }
            }
        }

        records.push(line.to_string());
        i += 1;
    }

    records
}

// ── Tests ─────────────────────────────────────────────────────────────────────
