//! Media index operations.
//!
//! CRUD operations for the `media_files` table. Every function takes a
//! borrowed connection; callers decide whether it runs on its own or
//! inside a transaction.

use rusqlite::{params, Connection, Row};

use crate::db::{DbError, DbResult};
use crate::models::{MediaKind, MediaRecord};

const SELECT_COLUMNS: &str = "SELECT path, filename, extension, media_kind, duration, size,
        last_modified, title, artist, album, genre, bitrate, sample_rate, channels
 FROM media_files";

/// Map a database row to a MediaRecord
fn row_to_record(row: &Row) -> rusqlite::Result<MediaRecord> {
    let kind: String = row.get("media_kind")?;
    let kind = MediaKind::from_db(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown media kind {:?}", kind).into(),
        )
    })?;

    Ok(MediaRecord {
        path: row.get("path")?,
        filename: row.get("filename")?,
        extension: row.get("extension")?,
        kind,
        duration: row.get::<_, Option<f64>>("duration")?.unwrap_or(0.0),
        size: row.get::<_, Option<i64>>("size")?.unwrap_or(0).max(0) as u64,
        last_modified: row.get::<_, Option<f64>>("last_modified")?.unwrap_or(0.0),
        title: row.get::<_, Option<String>>("title")?.unwrap_or_default(),
        artist: row.get::<_, Option<String>>("artist")?.unwrap_or_default(),
        album: row.get::<_, Option<String>>("album")?.unwrap_or_default(),
        genre: row.get::<_, Option<String>>("genre")?.unwrap_or_default(),
        bitrate: row.get::<_, Option<u32>>("bitrate")?.unwrap_or(0),
        sample_rate: row.get::<_, Option<u32>>("sample_rate")?.unwrap_or(0),
        channels: row.get::<_, Option<u8>>("channels")?.unwrap_or(0),
    })
}

/// Reject records that would break the store's invariants
fn check_record(record: &MediaRecord) -> DbResult<()> {
    if record.path.is_empty() {
        return Err(DbError::Constraint("path must not be empty".to_string()));
    }
    if MediaKind::from_extension(&record.extension) != Some(record.kind) {
        return Err(DbError::Constraint(format!(
            "unsupported extension {:?} for {}",
            record.extension, record.path
        )));
    }
    if !record.duration.is_finite() || record.duration < 0.0 {
        return Err(DbError::Constraint(format!(
            "invalid duration {} for {}",
            record.duration, record.path
        )));
    }
    Ok(())
}

/// Insert a record, replacing any existing record with the same path
pub fn upsert_record(conn: &Connection, record: &MediaRecord) -> DbResult<()> {
    check_record(record)?;

    conn.execute(
        "INSERT OR REPLACE INTO media_files
         (path, filename, extension, media_kind, duration, size, last_modified,
          title, artist, album, genre, bitrate, sample_rate, channels)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            record.path,
            record.filename,
            record.extension,
            record.kind.as_str(),
            record.duration,
            record.size as i64,
            record.last_modified,
            record.title,
            record.artist,
            record.album,
            record.genre,
            record.bitrate,
            record.sample_rate,
            record.channels,
        ],
    )?;

    Ok(())
}

/// Upsert many records. Run it inside `Database::transaction` to make the
/// batch all-or-nothing.
pub fn upsert_records_bulk(conn: &Connection, records: &[MediaRecord]) -> DbResult<usize> {
    for record in records {
        upsert_record(conn, record)?;
    }
    Ok(records.len())
}

/// All records ordered by filename (byte order), then path
pub fn get_all(conn: &Connection) -> DbResult<Vec<MediaRecord>> {
    let sql = format!("{} ORDER BY filename, path", SELECT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map([], row_to_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

/// Records ordered by filename, at most `limit` of them
pub fn get_page(conn: &Connection, limit: usize) -> DbResult<Vec<MediaRecord>> {
    let sql = format!("{} ORDER BY filename, path LIMIT ?", SELECT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map([limit as i64], row_to_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

/// Get a record by path
pub fn get_by_path(conn: &Connection, path: &str) -> DbResult<Option<MediaRecord>> {
    let sql = format!("{} WHERE path = ?", SELECT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;

    match stmt.query_row([path], row_to_record) {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Escape LIKE wildcards so `text` matches literally
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Case-insensitive substring match on filename, title, artist or album.
///
/// Both sides are folded with the same Unicode lowercasing (`fold_case`,
/// see `schema::register_functions`), so non-ASCII text matches too.
pub fn substring_search(conn: &Connection, text: &str, limit: usize) -> DbResult<Vec<MediaRecord>> {
    let pattern = like_pattern(&text.to_lowercase());
    let sql = format!(
        "{} WHERE fold_case(filename) LIKE ?1 ESCAPE '\\'
            OR fold_case(title) LIKE ?1 ESCAPE '\\'
            OR fold_case(artist) LIKE ?1 ESCAPE '\\'
            OR fold_case(album) LIKE ?1 ESCAPE '\\'
         ORDER BY filename, path
         LIMIT ?2",
        SELECT_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params![pattern, limit as i64], row_to_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

/// Delete a record by path. Returns whether a record was removed.
pub fn delete_by_path(conn: &Connection, path: &str) -> DbResult<bool> {
    let deleted = conn.execute("DELETE FROM media_files WHERE path = ?", [path])?;
    Ok(deleted > 0)
}

/// Delete every record, then VACUUM to give the space back
pub fn clear_all(conn: &Connection) -> DbResult<()> {
    conn.execute("DELETE FROM media_files", [])?;
    conn.execute_batch("VACUUM")?;
    Ok(())
}

pub fn count(conn: &Connection) -> DbResult<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM media_files", [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}
