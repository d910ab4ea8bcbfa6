//! Media record model and the fixed set of supported extensions.
//!
//! A `MediaRecord` is the snapshot of one indexed file. It is what the
//! scanner produces, what the store persists and what search returns.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

/// Supported audio file extensions (lowercase, no dot)
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a", "wma"];

/// Supported video file extensions (lowercase, no dot)
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv", "wmv", "m4v", "webm"];

/// Whether a record is an audio or a video file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Map a lowercase, dotless extension to its kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        if AUDIO_EXTENSIONS.contains(&ext) {
            Some(MediaKind::Audio)
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// Lowercase, dotless extension of `path` if it is in the supported set
pub fn supported_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    MediaKind::from_extension(&ext).map(|_| ext)
}

/// Check if a path has a supported audio or video extension
pub fn is_media_file(path: &Path) -> bool {
    supported_extension(path).is_some()
}

/// One indexed media file.
///
/// Text fields use the empty string for "absent" and numeric fields use 0
/// for "unknown", so no field is ever null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Absolute path, unique across the store
    pub path: String,
    pub filename: String,
    /// Lowercase extension without the dot
    pub extension: String,
    pub kind: MediaKind,
    /// Duration in seconds, 0.0 when unknown
    pub duration: f64,
    /// Size in bytes
    pub size: u64,
    /// Last modification time in seconds since the Unix epoch
    pub last_modified: f64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    /// Bitrate in kbps
    pub bitrate: u32,
    /// Sample rate in Hz
    pub sample_rate: u32,
    pub channels: u8,
}

impl MediaRecord {
    /// Build a record with filename-derived defaults for everything the
    /// file itself has to tell us.
    ///
    /// Returns `None` when the extension is not supported.
    pub fn with_defaults(path: &Path) -> Option<Self> {
        let extension = supported_extension(path)?;
        let kind = MediaKind::from_extension(&extension)?;

        Some(MediaRecord {
            path: path.to_string_lossy().to_string(),
            filename: path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            extension,
            kind,
            duration: 0.0,
            size: 0,
            last_modified: 0.0,
            title: file_stem(path),
            artist: String::new(),
            album: String::new(),
            genre: String::new(),
            bitrate: 0,
            sample_rate: 0,
            channels: 0,
        })
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// Text the fuzzy ranker compares a query against
    pub fn search_key(&self) -> String {
        format!(
            "{} {} {} {}",
            self.filename, self.title, self.artist, self.album
        )
    }
}

/// Filename without its extension, used as the fallback title
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Sort order for result lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Columns a result list can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    Filename,
    Duration,
    Kind,
    Size,
    Artist,
    Album,
}

impl SortColumn {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "filename" | "name" => SortColumn::Filename,
            "duration" => SortColumn::Duration,
            "kind" | "type" => SortColumn::Kind,
            "size" => SortColumn::Size,
            "artist" => SortColumn::Artist,
            "album" => SortColumn::Album,
            _ => SortColumn::Filename,
        }
    }

    fn compare(&self, a: &MediaRecord, b: &MediaRecord) -> Ordering {
        match self {
            SortColumn::Filename => a.filename.to_lowercase().cmp(&b.filename.to_lowercase()),
            SortColumn::Duration => a.duration.total_cmp(&b.duration),
            // audio before video
            SortColumn::Kind => a.is_video().cmp(&b.is_video()),
            SortColumn::Size => a.size.cmp(&b.size),
            SortColumn::Artist => a.artist.to_lowercase().cmp(&b.artist.to_lowercase()),
            SortColumn::Album => a.album.to_lowercase().cmp(&b.album.to_lowercase()),
        }
    }
}

/// Stable in-place sort of a result list
pub fn sort_records(records: &mut [MediaRecord], column: SortColumn, order: SortOrder) {
    records.sort_by(|a, b| {
        let ord = column.compare(a, b);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}
