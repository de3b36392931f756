//! Log file discovery and line loading.
//!
//! Reads smbd debug logs and syslog files holding `smbd_audit:` lines. The
//! lines come back exactly as written, minus the line terminator, ready for
//! [`reconstruct`](crate::reconstruct::reconstruct) with
//! [`Framing::DirectRead`](crate::reconstruct::Framing::DirectRead).

use std::io::BufRead;
use std::path::{Path, PathBuf};

use smblog_core::error::{Result, SmbLogError};
use tracing::{debug, warn};

// ── Public API ────────────────────────────────────────────────────────────────

/// Every regular file at or beneath `path`, sorted by path.
///
/// A file path yields itself. A missing path yields nothing.
pub fn find_log_files(path: &Path) -> Vec<PathBuf> {
    if !path.exists() {
        warn!("Log path does not exist: {}", path.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Read every line of a single file.
///
/// Invalid UTF-8 (file names in foreign code pages are common in smbd logs)
/// is replaced rather than rejected.
pub fn read_log_lines(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path).map_err(|source| SmbLogError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = std::io::BufReader::new(file);

    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| SmbLogError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        if read == 0 {
            break;
        }
        lines.push(strip_line_ending(&String::from_utf8_lossy(&buf)).to_string());
    }

    debug!("File {}: {} lines", path.display(), lines.len());
    Ok(lines)
}

/// Read the lines of every file under `path`, file by file in path order.
///
/// Unreadable files inside a directory are skipped with a warning; an
/// unreadable file given directly is an error, as is a missing path.
pub fn load_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(SmbLogError::FileRead {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
        });
    }

    if path.is_file() {
        return read_log_lines(path);
    }

    let files = find_log_files(path);
    if files.is_empty() {
        warn!("No log files found in {}", path.display());
        return Ok(Vec::new());
    }

    let mut all_lines = Vec::new();
    for file in &files {
        match read_log_lines(file) {
            Ok(lines) => all_lines.extend(lines),
            Err(e) => warn!("{}", e),
        }
    }

    debug!(
        "Loaded {} lines from {} files",
        all_lines.len(),
        files.len()
    );
    Ok(all_lines)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
