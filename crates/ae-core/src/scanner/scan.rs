//! Scan orchestration.
//!
//! Counts the media files under the roots, then walks them again,
//! extracting and upserting one file at a time. The cancel flag is polled
//! before every root, every directory entry and every store write.

use crossbeam_channel::Sender;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanSettings;
use crate::db::{library, Database};
use crate::events::{ScanComplete, ScanEvent, ScanProgress};
use crate::models::{is_media_file, MediaRecord};
use crate::scanner::metadata::extract;
use crate::scanner::{panic_message, ScanStats};

/// Signature of the per-file metadata extractor
pub type Extractor = fn(&Path) -> Option<MediaRecord>;

fn is_cancelled(cancel: &AtomicBool) -> bool {
    cancel.load(Ordering::Acquire)
}

/// Regular files, plus symlinks that resolve to regular files
fn is_candidate(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    (file_type.is_file() || (file_type.is_symlink() && entry.path().is_file()))
        && is_media_file(entry.path())
}

fn absolute(root: &Path) -> PathBuf {
    std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf())
}

/// Estimate how many media files live under `roots`.
///
/// Unreadable subtrees are skipped silently. The result is never below 1
/// so it can be used as a divisor.
pub fn count_media_files(roots: &[PathBuf], follow_links: bool, cancel: &AtomicBool) -> usize {
    let mut count = 0;

    for root in roots {
        if is_cancelled(cancel) {
            break;
        }

        if root.is_file() {
            if is_media_file(root) {
                count += 1;
            }
            continue;
        }

        for entry in WalkDir::new(root).follow_links(follow_links) {
            if is_cancelled(cancel) {
                break;
            }
            match entry {
                Ok(entry) if is_candidate(&entry) => count += 1,
                Ok(_) => {}
                Err(e) => debug!(error = %e, "skipping unreadable entry while counting"),
            }
        }
    }

    count.max(1)
}

/// Runs one scan over a set of roots, writing into a `Database`
#[derive(Clone)]
pub struct Scanner {
    db: Database,
    settings: ScanSettings,
    extractor: Extractor,
}

/// Per-run mutable state
struct RunState<'a> {
    job_id: Uuid,
    cancel: &'a AtomicBool,
    events: &'a Sender<ScanEvent>,
    records: Vec<MediaRecord>,
    stats: ScanStats,
}

impl RunState<'_> {
    fn cancelled(&self) -> bool {
        is_cancelled(self.cancel)
    }

    fn report_progress(&self) {
        let total = self.stats.estimated_total;
        let scanned = self.stats.scanned;
        // Receiver may be gone; the scan still runs to keep the store current
        let _ = self.events.send(ScanEvent::Progress(ScanProgress {
            job_id: self.job_id,
            percent: (scanned * 100 / total) as u32,
            total,
            scanned,
            message: format!("Scanned {}/{} files...", scanned, total),
        }));
    }
}

impl Scanner {
    pub fn new(db: Database, settings: ScanSettings) -> Self {
        Self {
            db,
            settings,
            extractor: extract,
        }
    }

    /// Replace the metadata extractor
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Scan `roots` to completion or until `cancel` is set.
    ///
    /// Progress events go to `events` as the scan advances. The terminal
    /// event is left to the caller, built from the returned value.
    pub fn run(
        &self,
        job_id: Uuid,
        roots: &[PathBuf],
        cancel: &AtomicBool,
        events: &Sender<ScanEvent>,
    ) -> ScanComplete {
        let started = Instant::now();
        let roots: Vec<PathBuf> = roots.iter().map(|r| absolute(r)).collect();

        let mut state = RunState {
            job_id,
            cancel,
            events,
            records: Vec::new(),
            stats: ScanStats {
                estimated_total: count_media_files(&roots, self.settings.follow_links, cancel),
                ..Default::default()
            },
        };

        info!(%job_id, roots = roots.len(), estimated = state.stats.estimated_total, "scan started");

        for root in &roots {
            if state.cancelled() {
                break;
            }

            if root.is_file() {
                self.index_file(root, &mut state);
            } else if root.is_dir() {
                self.index_directory(root, &mut state);
            } else {
                warn!(root = %root.display(), "scan root does not exist, skipping");
            }
        }

        let cancelled = state.cancelled();
        info!(
            %job_id,
            scanned = state.stats.scanned,
            extract_errors = state.stats.extract_errors,
            store_errors = state.stats.store_errors,
            walk_errors = state.stats.walk_errors,
            cancelled,
            "scan finished"
        );

        ScanComplete {
            job_id,
            records: state.records,
            stats: state.stats,
            cancelled,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn index_directory(&self, dir: &Path, state: &mut RunState<'_>) {
        let walker = WalkDir::new(dir)
            .follow_links(self.settings.follow_links)
            .sort_by_file_name();

        for entry in walker {
            if state.cancelled() {
                break;
            }

            match entry {
                Ok(entry) if is_candidate(&entry) => self.index_file(entry.path(), state),
                Ok(_) => {}
                Err(e) => {
                    state.stats.walk_errors += 1;
                    warn!(error = %e, "skipping unreadable entry");
                }
            }
        }
    }

    fn index_file(&self, path: &Path, state: &mut RunState<'_>) {
        // A panic is contained to the file that caused it
        let record = match panic::catch_unwind(AssertUnwindSafe(|| (self.extractor)(path))) {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(payload) => {
                state.stats.extract_errors += 1;
                warn!(path = %path.display(), error = %panic_message(&*payload), "extractor panicked, skipping file");
                return;
            }
        };

        // A file still being read when the job was cancelled is dropped
        if state.cancelled() {
            return;
        }

        if let Err(e) = self.db.with_conn(|conn| library::upsert_record(conn, &record)) {
            state.stats.store_errors += 1;
            warn!(path = %record.path, error = %e, "failed to store record");
        }

        state.records.push(record);
        state.stats.scanned += 1;

        if state.stats.scanned % self.settings.progress_interval.max(1) == 0 {
            state.report_progress();
        }
    }
}
