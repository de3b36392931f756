//! Line sources feeding the analysis pass.
//!
//! Each source knows how its lines were framed: files on disk keep every
//! physical line, while saved query results deliver header and detail lines
//! as separate entries that must be paired back together.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use smblog_core::error::{Result, SmbLogError};
use smblog_data::reader;
use smblog_data::reconstruct::Framing;
use tracing::debug;

/// Something that can hand over a batch of raw log lines.
pub trait LineSource: Send + Sync {
    /// Short human-readable description used in log output.
    fn name(&self) -> String;

    /// How the fetched lines must be regrouped into logical records.
    fn framing(&self) -> Framing;

    /// Fetch the current batch of lines. May block on I/O.
    fn fetch(&self) -> Result<Vec<String>>;
}

// ── FileSource ────────────────────────────────────────────────────────────────

/// A single log file, or every regular file beneath a directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LineSource for FileSource {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn framing(&self) -> Framing {
        Framing::DirectRead
    }

    fn fetch(&self) -> Result<Vec<String>> {
        reader::load_lines(&self.path)
    }
}

// ── QueryResultSource ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: QueryData,
}

#[derive(Debug, Default, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<QueryStream>,
}

#[derive(Debug, Deserialize)]
struct QueryStream {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// A saved log-query response on disk.
///
/// Shape: `{"data":{"result":[{"stream":{..},"values":[[ts, line], ..]}]}}`.
/// Every value pair contributes its second element, streams in order.
#[derive(Debug, Clone)]
pub struct QueryResultSource {
    path: PathBuf,
}

impl QueryResultSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LineSource for QueryResultSource {
    fn name(&self) -> String {
        format!("query-result:{}", self.path.display())
    }

    fn framing(&self) -> Framing {
        Framing::Reassembly
    }

    fn fetch(&self) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| SmbLogError::FileRead {
            path: self.path.clone(),
            source,
        })?;
        let lines = parse_query_response(&content)?;
        debug!("Query result {}: {} lines", self.path.display(), lines.len());
        Ok(lines)
    }
}

/// Extract the log lines from a query response body.
///
/// Value entries with fewer than two elements are skipped.
pub fn parse_query_response(body: &str) -> Result<Vec<String>> {
    let response: QueryResponse = serde_json::from_str(body)?;

    Ok(response
        .data
        .result
        .into_iter()
        .flat_map(|stream| stream.values)
        .filter_map(|mut pair| {
            if pair.len() >= 2 {
                Some(pair.swap_remove(1))
            } else {
                None
            }
        })
        .collect())
}

// ── StaticSource ──────────────────────────────────────────────────────────────

/// Lines held in memory.
#[derive(Debug, Clone)]
pub struct StaticSource {
    lines: Vec<String>,
    framing: Framing,
}

impl StaticSource {
    pub fn new(lines: Vec<String>, framing: Framing) -> Self {
        Self { lines, framing }
    }
}

impl LineSource for StaticSource {
    fn name(&self) -> String {
        format!("static:{} lines", self.lines.len())
    }

    fn framing(&self) -> Framing {
        self.framing
    }

    fn fetch(&self) -> Result<Vec<String>> {
        Ok(self.lines.clone())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
