//! Shared types for the SMB log parser: the event and counter model, the
//! error type, settings and timestamp handling.

pub mod error;
pub mod models;
pub mod settings;
pub mod time_utils;
