//! Runtime layer for the SMB log parser.
//!
//! Connects line sources to the analysis engine and hands the resulting
//! counters to metrics sinks, once or on a fixed interval.

pub mod runner;
pub mod sink;
pub mod source;
