//! Log interpretation engine for Samba file activity.
//!
//! Regroups raw log lines into logical records, recognises the smbd debug and
//! `smbd_audit:` layouts, classifies each record into a file operation and
//! folds the results into per-(user, device) counters.

pub mod aggregator;
pub mod analysis;
pub mod classifier;
pub mod parser;
pub mod reader;
pub mod reconstruct;
