//! Database module for the media index.
//!
//! This module provides SQLite access with connection pooling. Every
//! operation checks a connection out, runs one statement or transaction and
//! hands it back, so the scan worker and the foreground never share a
//! half-finished write.

pub mod library;
pub mod schema;


use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Incompatible schema: {0}")]
    SchemaMismatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database at {path} could not be recovered: {source}")]
    Unrecoverable {
        path: PathBuf,
        #[source]
        source: Box<DbError>,
    },
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection pool type alias
pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Steps of the self-healing open sequence.
///
/// The sequence is linear: a failed first attempt is backed up, the store
/// is deleted, and exactly one more attempt is made.
#[derive(Debug)]
enum OpenState {
    Opening,
    BackingUp(DbError),
    Rebuilding(DbError),
    Retrying(DbError),
}

/// Main database interface with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: Arc<DbPool>,
}

impl Database {
    /// Open (or create) the index at `db_path`.
    ///
    /// An existing store with a compatible schema keeps its records. A store
    /// that cannot be opened, is corrupt, or has an incompatible schema is
    /// copied to `<db_path>.backup`, deleted, and created again empty. If the
    /// fresh store cannot be opened either, `DbError::Unrecoverable` is
    /// returned.
    pub fn open<P: AsRef<Path>>(db_path: P) -> DbResult<Self> {
        let path = db_path.as_ref();
        let mut state = OpenState::Opening;

        loop {
            state = match state {
                OpenState::Opening => match Self::try_open(path) {
                    Ok(db) => return Ok(db),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to open media index");
                        OpenState::BackingUp(e)
                    }
                },
                OpenState::BackingUp(e) => {
                    backup_store(path);
                    OpenState::Rebuilding(e)
                }
                OpenState::Rebuilding(e) => {
                    remove_store_files(path);
                    OpenState::Retrying(e)
                }
                OpenState::Retrying(first) => match Self::try_open(path) {
                    Ok(db) => {
                        info!(path = %path.display(), cause = %first, "media index rebuilt empty");
                        return Ok(db);
                    }
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "giving up on media index");
                        return Err(DbError::Unrecoverable {
                            path: path.to_path_buf(),
                            source: Box::new(e),
                        });
                    }
                },
            };
        }
    }

    /// Create an in-memory database (useful for testing)
    pub fn new_in_memory() -> DbResult<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|c| schema::register_functions(c));
        let pool = Pool::builder().max_size(1).build(manager)?;

        let conn = pool.get()?;
        schema::init(&conn)?;
        drop(conn);

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Single open attempt: validate the file on a probe connection, then
    /// build the pool.
    fn try_open(path: &Path) -> DbResult<Self> {
        {
            let conn = Connection::open(path)?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                ",
            )?;
            schema::init(&conn)?;
        }

        let manager = SqliteConnectionManager::file(path).with_init(|c| {
            c.busy_timeout(BUSY_TIMEOUT)?;
            schema::register_functions(c)
        });
        let pool = Pool::builder()
            .max_size(4)
            .min_idle(Some(1))
            .build(manager)?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> DbResult<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// Execute a function with a connection
    pub fn with_conn<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
    {
        let conn = self.conn()?;
        f(&conn)
    }

    /// Execute a function within a transaction
    pub fn transaction<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
    {
        let mut conn = self.conn()?;

        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;

        Ok(result)
    }

    /// Remove every record and reclaim the file space.
    ///
    /// If the delete or vacuum fails, the table is dropped and recreated
    /// once instead.
    pub fn clear(&self) -> DbResult<()> {
        match self.with_conn(library::clear_all) {
            Ok(()) => {
                info!("media index cleared");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "clearing media index failed, recreating table");
                self.with_conn(schema::recreate)
            }
        }
    }
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Best-effort copy of the current store to `<path>.backup`
fn backup_store(path: &Path) {
    if !path.exists() {
        return;
    }
    let backup = sidecar_path(path, ".backup");
    match fs::copy(path, &backup) {
        Ok(_) => info!(backup = %backup.display(), "backed up media index"),
        Err(e) => warn!(error = %e, "could not back up media index"),
    }
}

fn remove_store_files(path: &Path) {
    for p in [
        path.to_path_buf(),
        sidecar_path(path, "-wal"),
        sidecar_path(path, "-shm"),
    ] {
        if p.exists() {
            if let Err(e) = fs::remove_file(&p) {
                warn!(path = %p.display(), error = %e, "could not remove store file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_in_memory_database() {
        let db = Database::new_in_memory().expect("Failed to create in-memory database");
        let count = db.with_conn(library::count).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_open_file_database_uses_wal() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("index.db")).unwrap();
        let conn = db.conn().unwrap();

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode, "wal");
    }

    #[test]
    fn test_reopen_keeps_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.db");

        {
            let db = Database::open(&path).unwrap();
            let record =
                crate::models::MediaRecord::with_defaults(Path::new("/music/a.mp3")).unwrap();
            db.with_conn(|c| library::upsert_record(c, &record)).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.with_conn(library::count).unwrap(), 1);
        assert!(!sidecar_path(&path, ".backup").exists());
    }

    #[test]
    fn test_corrupt_file_is_backed_up_and_rebuilt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.db");
        fs::write(&path, vec![b'x'; 4096]).unwrap();

        let db = Database::open(&path).expect("corrupt store should self-heal");
        assert_eq!(db.with_conn(library::count).unwrap(), 0);

        let backup = sidecar_path(&path, ".backup");
        assert!(backup.exists());
        assert_eq!(fs::read(backup).unwrap(), vec![b'x'; 4096]);
    }

    #[test]
    fn test_incompatible_schema_is_rebuilt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute(
                "CREATE TABLE media_files (id INTEGER PRIMARY KEY, path TEXT, is_video INTEGER)",
                [],
            )
            .unwrap();
            conn.execute("INSERT INTO media_files (path, is_video) VALUES ('x', 0)", [])
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.with_conn(library::count).unwrap(), 0);
        assert!(sidecar_path(&path, ".backup").exists());
    }

    #[test]
    fn test_unrecoverable_open_gives_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join("index.db");

        match Database::open(&path) {
            Err(DbError::Unrecoverable { path: p, .. }) => assert_eq!(p, path),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("open should fail when the directory does not exist"),
        }
    }

    #[test]
    fn test_clear_is_idempotent() {
        let db = Database::new_in_memory().unwrap();
        db.clear().unwrap();
        db.clear().unwrap();
        assert_eq!(db.with_conn(library::count).unwrap(), 0);
    }
}
