//! Metadata extraction using lofty.
//!
//! Tags and audio properties are read with lofty. A file lofty cannot read
//! (corrupt, unsupported container, video lofty does not parse) still
//! yields a record built from its filename and filesystem stats.

use lofty::error::LoftyError;
use lofty::file::TaggedFile;
use lofty::prelude::*;
use lofty::probe::Probe;
use std::path::Path;
use tracing::debug;

use crate::models::{file_stem, MediaRecord};
use crate::scanner::fingerprint::FileStat;

fn read_tagged_file(path: &Path) -> Result<TaggedFile, LoftyError> {
    Probe::open(path)?.read()
}

fn non_blank(s: Option<std::borrow::Cow<'_, str>>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Copy tag values and audio properties from `tagged` into `record`
fn apply_tags(record: &mut MediaRecord, tagged: &TaggedFile, path: &Path) {
    let properties = tagged.properties();
    record.duration = properties.duration().as_secs_f64();
    record.bitrate = properties.audio_bitrate().unwrap_or(0);
    record.sample_rate = properties.sample_rate().unwrap_or(0);
    record.channels = properties.channels().unwrap_or(0);

    // Get tag (primary or first available)
    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        record.title = non_blank(tag.title()).unwrap_or_else(|| file_stem(path));
        record.artist = non_blank(tag.artist()).unwrap_or_default();
        record.album = non_blank(tag.album()).unwrap_or_default();
        record.genre = non_blank(tag.genre()).unwrap_or_default();
    }
}

/// Extract a record for a single media file.
///
/// Returns `None` only when the extension is not supported. Stat failures
/// give zero size and mtime. Tag failures give filename defaults.
pub fn extract(path: &Path) -> Option<MediaRecord> {
    let mut record = MediaRecord::with_defaults(path)?;

    let stat = FileStat::from_path_or_zero(path);
    record.size = stat.size;
    record.last_modified = stat.mtime;

    match read_tagged_file(path) {
        Ok(tagged) => apply_tags(&mut record, &tagged, path),
        Err(e) => debug!(path = %path.display(), error = %e, "tags unreadable, using defaults"),
    }

    Some(record)
}

/// Duration of a media file in seconds, 0.0 if it cannot be read
pub fn media_duration(path: &Path) -> f64 {
    match read_tagged_file(path) {
        Ok(tagged) => tagged.properties().duration().as_secs_f64(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "duration unavailable");
            0.0
        }
    }
}
