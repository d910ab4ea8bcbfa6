//! Human readable values for result listings.

use chrono::{Local, TimeZone};

use crate::models::MediaRecord;

/// `MM:SS`, or `H:MM:SS` from one hour up. Unknown durations render as "N/A".
pub fn format_duration(seconds: f64) -> String {
    if !(seconds > 0.0) {
        return "N/A".to_string();
    }

    let total = seconds as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else {
        format!("{:.2} GB", b / GB)
    }
}

/// Local `YYYY-MM-DD HH:MM`, or "N/A" for a zero/invalid timestamp
pub fn format_timestamp(epoch_secs: f64) -> String {
    if !(epoch_secs > 0.0) {
        return "N/A".to_string();
    }
    match Local.timestamp_opt(epoch_secs as i64, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => "N/A".to_string(),
    }
}

fn or_unknown(s: &str) -> &str {
    if s.is_empty() { "Unknown" } else { s }
}

/// One display row: filename, duration, type, size, artist, album, genre, path
pub fn display_row(record: &MediaRecord) -> [String; 8] {
    [
        record.filename.clone(),
        format_duration(record.duration),
        if record.is_video() { "Video" } else { "Audio" }.to_string(),
        format_size(record.size),
        or_unknown(&record.artist).to_string(),
        or_unknown(&record.album).to_string(),
        or_unknown(&record.genre).to_string(),
        record.path.clone(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "N/A");
        assert_eq!(format_duration(-3.0), "N/A");
        assert_eq!(format_duration(f64::NAN), "N/A");
        assert_eq!(format_duration(75.9), "01:15");
        assert_eq!(format_duration(3599.0), "59:59");
        assert_eq!(format_duration(3725.0), "1:02:05");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_format_timestamp_unknown() {
        assert_eq!(format_timestamp(0.0), "N/A");
        assert_ne!(format_timestamp(1_700_000_000.0), "N/A");
    }

    #[test]
    fn test_display_row() {
        let record = MediaRecord::with_defaults(Path::new("/v/clip.mkv")).unwrap();
        let row = display_row(&record);
        assert_eq!(row[0], "clip.mkv");
        assert_eq!(row[1], "N/A");
        assert_eq!(row[2], "Video");
        assert_eq!(row[3], "0 B");
        assert_eq!(row[4], "Unknown");
        assert_eq!(row[7], "/v/clip.mkv");
    }
}
