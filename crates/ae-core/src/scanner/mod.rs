//! Media scanner module.
//!
//! A scan runs in two passes over the same roots:
//! - Count: a quick walk that estimates how many media files there are, so
//!   progress can be reported as a percentage
//! - Index: the real walk that extracts metadata per file and upserts each
//!   record into the store as soon as it is read
//!
//! Scans run on a background thread (`job`) and report through
//! `crate::events::ScanEvent`.

pub mod fingerprint;
pub mod job;
pub mod metadata;
pub mod scan;

use serde::{Deserialize, Serialize};
use std::any::Any;
use thiserror::Error;

/// Scanner error types
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scan worker panicked: {0}")]
    Panicked(String),

    #[error("Scan worker could not be started: {0}")]
    Spawn(String),
}

pub type ScanResult<T> = Result<T, ScanError>;

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Statistics from one scan job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Estimated number of media files, from the counting pass (at least 1)
    pub estimated_total: usize,
    /// Files extracted successfully
    pub scanned: usize,
    /// Files skipped because the extractor panicked on them
    pub extract_errors: usize,
    /// Directory entries that could not be read
    pub walk_errors: usize,
    /// Records that could not be written to the store
    pub store_errors: usize,
}
