//! Scan event types sent from the scan worker to the foreground.
//!
//! A job emits zero or more `Progress` events with a non-decreasing
//! `scanned` count, followed by exactly one terminal event: `Completed`
//! or `Failed`.
//!
//! Event naming convention: `scan:action` (e.g., `scan:progress`)

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MediaRecord;
use crate::scanner::ScanStats;

/// Periodic progress report
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Scan job this event belongs to
    pub job_id: Uuid,
    /// `scanned * 100 / total`, not clamped (may exceed 100)
    pub percent: u32,
    /// Estimated number of media files under the roots
    pub total: usize,
    /// Files extracted so far
    pub scanned: usize,
    /// Human readable status line
    pub message: String,
}

impl ScanProgress {
    pub const EVENT_NAME: &'static str = "scan:progress";
}

/// The job ran to the end, or stopped early because it was cancelled
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanComplete {
    pub job_id: Uuid,
    /// Every record extracted by this job, in scan order
    pub records: Vec<MediaRecord>,
    pub stats: ScanStats,
    pub cancelled: bool,
    /// Wall clock duration of the job in milliseconds
    pub duration_ms: u64,
}

impl ScanComplete {
    pub const EVENT_NAME: &'static str = "scan:complete";
}

/// The job aborted on an unexpected failure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanFailed {
    pub job_id: Uuid,
    pub error: String,
}

impl ScanFailed {
    pub const EVENT_NAME: &'static str = "scan:error";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    Progress(ScanProgress),
    Completed(ScanComplete),
    Failed(ScanFailed),
}

impl ScanEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ScanEvent::Progress(_) => ScanProgress::EVENT_NAME,
            ScanEvent::Completed(_) => ScanComplete::EVENT_NAME,
            ScanEvent::Failed(_) => ScanFailed::EVENT_NAME,
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            ScanEvent::Progress(e) => e.job_id,
            ScanEvent::Completed(e) => e.job_id,
            ScanEvent::Failed(e) => e.job_id,
        }
    }

    /// Whether this is the last event of its job
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanEvent::Progress(_))
    }
}
