//! Background scan jobs.
//!
//! A `ScanJob` owns one worker thread and the flag used to cancel it. The
//! worker reports over its own channel, so a stale job can never deliver
//! events to a newer job's receiver. `ScanCoordinator` keeps at most one
//! job alive at a time.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ScanSettings;
use crate::db::Database;
use crate::events::{ScanComplete, ScanEvent, ScanFailed};
use crate::scanner::scan::{Extractor, Scanner};
use crate::scanner::{panic_message, ScanError, ScanResult};

/// Run a scan body and turn its outcome into the job's terminal event.
///
/// Per-file panics are already absorbed by the scanner; anything caught
/// here escaped the scan loop itself.
fn terminal_event(job_id: Uuid, run: impl FnOnce() -> ScanComplete) -> ScanEvent {
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(complete) => ScanEvent::Completed(complete),
        Err(payload) => {
            let err = ScanError::Panicked(panic_message(&*payload));
            error!(%job_id, error = %err, "scan failed");
            ScanEvent::Failed(ScanFailed {
                job_id,
                error: err.to_string(),
            })
        }
    }
}

fn worker(scanner: Scanner, job_id: Uuid, roots: Vec<PathBuf>, cancel: Arc<AtomicBool>, tx: Sender<ScanEvent>) {
    let terminal = terminal_event(job_id, || scanner.run(job_id, &roots, &cancel, &tx));
    let _ = tx.send(terminal);
}

/// Handle to a running scan
pub struct ScanJob {
    id: Uuid,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ScanJob {
    /// Start scanning `roots` on a new thread.
    ///
    /// Returns the job and the receiving end of its event channel. The
    /// channel closes after the terminal event.
    pub fn spawn(scanner: Scanner, roots: Vec<PathBuf>) -> ScanResult<(Self, Receiver<ScanEvent>)> {
        let id = Uuid::new_v4();
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = unbounded();

        let worker_cancel = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name(format!("ae-scan-{}", id.simple()))
            .spawn(move || worker(scanner, id, roots, worker_cancel, tx))
            .map_err(|e| ScanError::Spawn(e.to_string()))?;

        info!(job_id = %id, "scan job spawned");

        Ok((
            Self {
                id,
                cancel,
                handle: Some(handle),
            },
            rx,
        ))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the worker to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Block until the worker thread exits
    pub fn join(mut self) -> ScanResult<()> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> ScanResult<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|payload| ScanError::Panicked(panic_message(&*payload))),
            None => Ok(()),
        }
    }
}

impl Drop for ScanJob {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel();
            if let Err(e) = self.join_inner() {
                error!(job_id = %self.id, error = %e, "scan worker exited abnormally");
            }
        }
    }
}

/// Owns the single active scan job
pub struct ScanCoordinator {
    scanner: Scanner,
    active: Mutex<Option<ScanJob>>,
}

impl ScanCoordinator {
    pub fn new(db: Database, settings: ScanSettings) -> Self {
        Self {
            scanner: Scanner::new(db, settings),
            active: Mutex::new(None),
        }
    }

    /// Replace the metadata extractor used by future jobs
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.scanner = self.scanner.with_extractor(extractor);
        self
    }

    /// Start a scan of `roots`.
    ///
    /// Any job still running is cancelled and joined first, so it has
    /// stopped writing to the store before the new job begins.
    pub fn start(&self, roots: Vec<PathBuf>) -> ScanResult<Receiver<ScanEvent>> {
        let mut active = self.active.lock();

        if let Some(previous) = active.take() {
            info!(job_id = %previous.id(), "cancelling previous scan");
            previous.cancel();
            previous.join()?;
        }

        let (job, rx) = ScanJob::spawn(self.scanner.clone(), roots)?;
        *active = Some(job);
        Ok(rx)
    }

    /// Cancel the active job, if any, and wait for it to stop
    pub fn cancel(&self) -> ScanResult<()> {
        match self.active.lock().take() {
            Some(job) => {
                job.cancel();
                job.join()
            }
            None => Ok(()),
        }
    }

    /// Wait for the active job to finish on its own
    pub fn wait(&self) -> ScanResult<()> {
        match self.active.lock().take() {
            Some(job) => job.join(),
            None => Ok(()),
        }
    }

    pub fn active_job_id(&self) -> Option<Uuid> {
        self.active.lock().as_ref().map(ScanJob::id)
    }

    pub fn is_running(&self) -> bool {
        self.active.lock().as_ref().is_some_and(|job| !job.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::library;
    use crate::models::MediaRecord;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    fn panicking_extractor(_path: &Path) -> Option<MediaRecord> {
        panic!("extractor exploded");
    }

    fn slow_extractor(path: &Path) -> Option<MediaRecord> {
        thread::sleep(Duration::from_millis(20));
        crate::scanner::metadata::extract(path)
    }

    fn media_dir(count: usize) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        for i in 0..count {
            fs::write(dir.path().join(format!("track{:03}.mp3", i)), b"x").unwrap();
        }
        dir
    }

    fn drain(rx: Receiver<ScanEvent>) -> Vec<ScanEvent> {
        rx.iter().collect()
    }

    #[test]
    fn test_job_emits_single_terminal_event() {
        let dir = media_dir(7);
        let db = Database::new_in_memory().unwrap();
        let coordinator = ScanCoordinator::new(db.clone(), ScanSettings::default());

        let rx = coordinator.start(vec![dir.path().to_path_buf()]).unwrap();
        let events = drain(rx);
        coordinator.wait().unwrap();

        let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal.len(), 1);
        assert!(events.last().unwrap().is_terminal());

        match events.last().unwrap() {
            ScanEvent::Completed(done) => {
                assert!(!done.cancelled);
                assert_eq!(done.records.len(), 7);
            }
            other => panic!("unexpected terminal event: {:?}", other),
        }

        let job_id = events[0].job_id();
        assert!(events.iter().all(|e| e.job_id() == job_id));
        assert_eq!(db.with_conn(library::count).unwrap(), 7);
    }

    #[test]
    fn test_extractor_panics_do_not_fail_the_job() {
        let dir = media_dir(3);
        let db = Database::new_in_memory().unwrap();
        let coordinator =
            ScanCoordinator::new(db.clone(), ScanSettings::default()).with_extractor(panicking_extractor);

        let events = drain(coordinator.start(vec![dir.path().to_path_buf()]).unwrap());
        coordinator.wait().unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            ScanEvent::Completed(done) => {
                assert!(!done.cancelled);
                assert!(done.records.is_empty());
                assert_eq!(done.stats.extract_errors, 3);
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(db.with_conn(library::count).unwrap(), 0);
    }

    fn panics_on_middle_track(path: &Path) -> Option<MediaRecord> {
        if path.file_name().is_some_and(|n| n == "track001.mp3") {
            panic!("extractor exploded");
        }
        crate::scanner::metadata::extract(path)
    }

    #[test]
    fn test_one_bad_file_still_completes() {
        let dir = media_dir(3);
        let db = Database::new_in_memory().unwrap();
        let coordinator =
            ScanCoordinator::new(db.clone(), ScanSettings::default()).with_extractor(panics_on_middle_track);

        let events = drain(coordinator.start(vec![dir.path().to_path_buf()]).unwrap());
        coordinator.wait().unwrap();

        match events.last() {
            Some(ScanEvent::Completed(done)) => {
                assert_eq!(done.stats.extract_errors, 1);
                let names: Vec<&str> = done.records.iter().map(|r| r.filename.as_str()).collect();
                assert_eq!(names, vec!["track000.mp3", "track002.mp3"]);
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(db.with_conn(library::count).unwrap(), 2);
    }

    #[test]
    fn test_panic_outside_extraction_reports_failed() {
        let job_id = Uuid::new_v4();
        let event = terminal_event(job_id, || panic!("walker exploded"));

        assert!(event.is_terminal());
        match event {
            ScanEvent::Failed(failed) => {
                assert_eq!(failed.job_id, job_id);
                assert!(failed.error.contains("walker exploded"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_cancel_emits_cancelled_completion() {
        let dir = media_dir(50);
        let db = Database::new_in_memory().unwrap();
        let coordinator =
            ScanCoordinator::new(db.clone(), ScanSettings::default()).with_extractor(slow_extractor);

        let rx = coordinator.start(vec![dir.path().to_path_buf()]).unwrap();
        thread::sleep(Duration::from_millis(100));
        coordinator.cancel().unwrap();

        let events = drain(rx);
        match events.last() {
            Some(ScanEvent::Completed(done)) => {
                assert!(done.cancelled);
                assert!(done.records.len() < 50);
                // every reported record made it to the store
                assert_eq!(db.with_conn(library::count).unwrap(), done.records.len() as u64);
            }
            other => panic!("expected cancelled completion, got {:?}", other),
        }
        assert!(!coordinator.is_running());
    }

    #[test]
    fn test_restart_replaces_active_job() {
        let first = media_dir(50);
        let second = media_dir(3);
        let db = Database::new_in_memory().unwrap();
        let coordinator =
            ScanCoordinator::new(db, ScanSettings::default()).with_extractor(slow_extractor);

        let rx_a = coordinator.start(vec![first.path().to_path_buf()]).unwrap();
        let job_a = coordinator.active_job_id().unwrap();
        let rx_b = coordinator.start(vec![second.path().to_path_buf()]).unwrap();
        let job_b = coordinator.active_job_id().unwrap();
        assert_ne!(job_a, job_b);

        // first job was joined before the second started, so its stream is closed
        let events_a: Vec<_> = rx_a.try_iter().collect();
        match events_a.last() {
            Some(ScanEvent::Completed(done)) => assert!(done.cancelled),
            other => panic!("expected cancelled completion, got {:?}", other),
        }

        let events_b = drain(rx_b);
        coordinator.wait().unwrap();
        assert!(events_b.iter().all(|e| e.job_id() == job_b));
        match events_b.last() {
            Some(ScanEvent::Completed(done)) => assert_eq!(done.records.len(), 3),
            other => panic!("unexpected terminal event: {:?}", other),
        }
    }

    #[test]
    fn test_drop_cancels_job() {
        let dir = media_dir(50);
        let db = Database::new_in_memory().unwrap();
        let scanner = Scanner::new(db, ScanSettings::default()).with_extractor(slow_extractor);

        let (job, rx) = ScanJob::spawn(scanner, vec![dir.path().to_path_buf()]).unwrap();
        drop(job);

        let events: Vec<_> = rx.try_iter().collect();
        match events.last() {
            Some(ScanEvent::Completed(done)) => assert!(done.cancelled),
            other => panic!("expected cancelled completion, got {:?}", other),
        }
    }
}
