//! ae-core: Core library for the Audio Everything media browser
//!
//! This crate holds everything behind the front end: indexing media files
//! into SQLite, scanning directories on a background thread, and ranking
//! search results.
//!
//! # Architecture
//!
//! The crate is organized as follows:
//! - `models`: `MediaRecord` and the supported extension sets
//! - `scanner`: metadata extraction, directory walking and scan jobs
//! - `db`: SQLite store with connection pooling and self-healing open
//! - `search`: two-stage search (SQL substring filter, fuzzy re-rank)
//! - `events`: scan events sent from the worker to the foreground
//! - `export`: copying indexed files to a destination folder
//! - `config`: settings loaded from TOML and environment
//! - `format`: human readable values for display
//!
//! # Usage
//!
//! ```ignore
//! use ae_core::{Database, ScanCoordinator, ScanEvent, SearchEngine, Settings};
//!
//! let settings = Settings::load()?;
//! let db = Database::open(&settings.database.path)?;
//!
//! let coordinator = ScanCoordinator::new(db.clone(), settings.scan.clone());
//! let events = coordinator.start(vec!["/music".into()])?;
//! for event in events {
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//!
//! let engine = SearchEngine::new(db, settings.search.threshold);
//! let hits = engine.search("band", 100);
//! ```

pub mod config;
pub mod db;
pub mod events;
pub mod export;
pub mod format;
pub mod models;
pub mod scanner;
pub mod search;


// Re-export commonly used types at crate root for convenience
pub use config::{DatabaseSettings, ScanSettings, SearchSettings, Settings};
pub use db::{Database, DbError, DbResult};
pub use events::{ScanComplete, ScanEvent, ScanFailed, ScanProgress};
pub use export::{export_files, ExportError, ExportFailure, ExportReport};
pub use models::{MediaKind, MediaRecord, SortColumn, SortOrder};
pub use scanner::job::{ScanCoordinator, ScanJob};
pub use scanner::metadata::{extract, media_duration};
pub use scanner::scan::Scanner;
pub use scanner::{ScanError, ScanStats};
pub use search::{PartialRatio, ScoreError, Scorer, SearchDebouncer, SearchEngine};
