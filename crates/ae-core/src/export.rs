//! Copying indexed media files into a destination folder.

use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Cannot create destination {path}: {source}")]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination is not a directory: {0}")]
    NotADirectory(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one export
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportReport {
    /// Files created in the destination, in input order
    pub written: Vec<PathBuf>,
    pub failed: Vec<ExportFailure>,
}

impl ExportReport {
    pub fn attempted(&self) -> usize {
        self.written.len() + self.failed.len()
    }
}

/// First `<stem>.<ext>`, `<stem>_1.<ext>`, `<stem>_2.<ext>`, ... not
/// already present in `dest`
fn free_destination(dest: &Path, source: &Path) -> PathBuf {
    let file_name = source.file_name().map(PathBuf::from).unwrap_or_default();
    let candidate = dest.join(&file_name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1u32;
    loop {
        let candidate = dest.join(format!("{}_{}{}", stem, n, suffix));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

fn copy_with_mtime(source: &Path, target: &Path) -> std::io::Result<()> {
    fs::copy(source, target)?;

    let preserved = fs::metadata(source)
        .and_then(|m| m.modified())
        .and_then(|modified| File::options().write(true).open(target)?.set_modified(modified));
    if let Err(e) = preserved {
        debug!(target = %target.display(), error = %e, "could not preserve modification time");
    }
    Ok(())
}

/// Copy each of `paths` into `dest`, creating it if needed.
///
/// Existing files in `dest` are never overwritten: a clashing name gets a
/// `_N` suffix on its stem. Sources that are missing or fail to copy are
/// reported in `ExportReport::failed` and do not stop the export.
pub fn export_files<P: AsRef<Path>>(paths: &[P], dest: &Path) -> Result<ExportReport, ExportError> {
    fs::create_dir_all(dest).map_err(|source| ExportError::CreateDestination {
        path: dest.to_path_buf(),
        source,
    })?;
    if !dest.is_dir() {
        return Err(ExportError::NotADirectory(dest.to_path_buf()));
    }

    let mut report = ExportReport::default();

    for source in paths.iter().map(AsRef::as_ref) {
        if !source.is_file() {
            warn!(path = %source.display(), "export source missing");
            report.failed.push(ExportFailure {
                path: source.to_path_buf(),
                reason: "file not found".to_string(),
            });
            continue;
        }

        let target = free_destination(dest, source);
        match copy_with_mtime(source, &target) {
            Ok(()) => report.written.push(target),
            Err(e) => {
                warn!(path = %source.display(), error = %e, "export copy failed");
                report.failed.push(ExportFailure {
                    path: source.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        dest = %dest.display(),
        written = report.written.len(),
        attempted = report.attempted(),
        "export finished"
    );
    Ok(report)
}
