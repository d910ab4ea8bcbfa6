//! Database schema definitions.
//!
//! There are no incremental migrations: a store whose `media_files` table
//! does not match `EXPECTED_COLUMNS` is reported as incompatible and gets
//! rebuilt by `Database::open`.

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;

use crate::db::{DbError, DbResult};

pub const CREATE_MEDIA_FILES: &str = "CREATE TABLE IF NOT EXISTS media_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT UNIQUE NOT NULL,
    filename TEXT NOT NULL,
    extension TEXT NOT NULL,
    media_kind TEXT NOT NULL CHECK (media_kind IN ('audio', 'video')),
    duration REAL NOT NULL DEFAULT 0 CHECK (duration >= 0),
    size INTEGER NOT NULL DEFAULT 0 CHECK (size >= 0),
    last_modified REAL NOT NULL DEFAULT 0,
    title TEXT NOT NULL DEFAULT '',
    artist TEXT NOT NULL DEFAULT '',
    album TEXT NOT NULL DEFAULT '',
    genre TEXT NOT NULL DEFAULT '',
    bitrate INTEGER NOT NULL DEFAULT 0 CHECK (bitrate >= 0),
    sample_rate INTEGER NOT NULL DEFAULT 0 CHECK (sample_rate >= 0),
    channels INTEGER NOT NULL DEFAULT 0 CHECK (channels >= 0),
    indexed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

/// Index name and definition pairs
pub const CREATE_INDEXES: &[(&str, &str)] = &[
    (
        "idx_filename",
        "CREATE INDEX IF NOT EXISTS idx_filename ON media_files(filename)",
    ),
    (
        "idx_extension",
        "CREATE INDEX IF NOT EXISTS idx_extension ON media_files(extension)",
    ),
    (
        "idx_media_kind",
        "CREATE INDEX IF NOT EXISTS idx_media_kind ON media_files(media_kind)",
    ),
    (
        "idx_title",
        "CREATE INDEX IF NOT EXISTS idx_title ON media_files(title)",
    ),
    (
        "idx_artist",
        "CREATE INDEX IF NOT EXISTS idx_artist ON media_files(artist)",
    ),
];

/// Columns of `media_files`, in declaration order
pub const EXPECTED_COLUMNS: &[&str] = &[
    "id",
    "path",
    "filename",
    "extension",
    "media_kind",
    "duration",
    "size",
    "last_modified",
    "title",
    "artist",
    "album",
    "genre",
    "bitrate",
    "sample_rate",
    "channels",
    "indexed_at",
];

/// Register `fold_case(text)`, Unicode lowercasing for case-insensitive
/// matching. SQLite's own `LOWER()` only folds ASCII.
///
/// Functions live on the connection, so every new connection needs this.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|text| text.to_lowercase())),
    )
}

/// Create the table if needed, check it is compatible, then create indexes
pub fn init(conn: &Connection) -> DbResult<()> {
    register_functions(conn)?;
    conn.execute(CREATE_MEDIA_FILES, [])?;
    validate(conn)?;
    for (_, sql) in CREATE_INDEXES {
        conn.execute(sql, [])?;
    }
    Ok(())
}

/// Drop and recreate the table, discarding every record
pub fn recreate(conn: &Connection) -> DbResult<()> {
    conn.execute("DROP TABLE IF EXISTS media_files", [])?;
    init(conn)
}

fn validate(conn: &Connection) -> DbResult<()> {
    let columns = get_table_columns(conn, "media_files")?;
    if columns != EXPECTED_COLUMNS {
        return Err(DbError::SchemaMismatch(format!(
            "media_files has columns [{}]",
            columns.join(", ")
        )));
    }
    Ok(())
}

/// Get column names for a table
pub(crate) fn get_table_columns(conn: &Connection, table: &str) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(columns)
}
