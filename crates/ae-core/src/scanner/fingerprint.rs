//! Filesystem stats for a media file.
//!
//! Size and modification time are read without touching file contents.
//! A failed stat yields zeroes rather than an error.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Size and mtime of a file
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FileStat {
    /// File size in bytes
    pub size: u64,
    /// Modification time in seconds since the Unix epoch
    pub mtime: f64,
}

impl FileStat {
    /// Stat `path`, or an error if it cannot be read
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;

        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        Ok(FileStat {
            size: metadata.len(),
            mtime,
        })
    }

    /// Stat `path`, substituting zeroes when it cannot be read
    pub fn from_path_or_zero(path: &Path) -> Self {
        Self::from_path(path).unwrap_or_default()
    }
}
