/// ae - index, search and export local audio/video files
mod commands;

use ae_core::Settings;
use anyhow::Context as _;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ae")]
#[command(about = "Audio Everything: index and search local media files", long_about = None)]
struct Cli {
    /// Print machine readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Index database file (overrides database.path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan files and directories into the index
    Scan {
        /// Files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Fuzzy search the index
    Search {
        query: String,
        /// Maximum number of results (defaults to search.limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List indexed files
    List {
        /// Sort column: filename, duration, type, size, artist, album
        #[arg(short, long, default_value = "filename")]
        sort: String,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Number of indexed files
    Count,
    /// Show the indexed record for a file
    Info { path: PathBuf },
    /// Remove a file from the index (the file itself is untouched)
    Remove { path: PathBuf },
    /// Remove every record from the index
    Clear {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Copy files into a folder
    Export {
        /// Destination folder, created if missing
        dest: PathBuf,
        /// Export the results of this search
        #[arg(short, long)]
        query: Option<String>,
        /// Files to export
        paths: Vec<PathBuf>,
    },
    /// Print the duration of a media file
    Duration { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so --json output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ae_core=info,ae=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut settings = match cli.config {
        Some(path) => Settings::load_from(Some(path)),
        None => Settings::load(),
    }
    .context("failed to load settings")?;
    if let Some(db) = cli.db {
        settings.database.path = db;
    }
    settings.validate().map_err(anyhow::Error::msg)?;
    tracing::debug!(db = %settings.database.path.display(), "settings loaded");

    let ctx = commands::Context::new(settings, cli.json);

    match cli.command {
        Commands::Scan { paths } => commands::scan(&ctx, paths),
        Commands::Search { query, limit } => commands::search(&ctx, &query, limit),
        Commands::List { sort, desc, limit } => commands::list(&ctx, &sort, desc, limit),
        Commands::Count => commands::count(&ctx),
        Commands::Info { path } => commands::info(&ctx, &path),
        Commands::Remove { path } => commands::remove(&ctx, &path),
        Commands::Clear { yes } => commands::clear(&ctx, yes),
        Commands::Export { dest, query, paths } => commands::export(&ctx, &dest, query.as_deref(), paths),
        Commands::Duration { path } => commands::duration(&ctx, &path),
    }
}
