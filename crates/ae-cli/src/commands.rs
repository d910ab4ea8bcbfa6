//! Subcommand handlers.
//!
//! Each handler opens the index on demand, does one thing and prints the
//! result as a table or, with `--json`, as JSON on stdout.

use ae_core::db::library;
use ae_core::format::{display_row, format_duration, format_size, format_timestamp};
use ae_core::models::sort_records;
use ae_core::{
    Database, MediaRecord, ScanCoordinator, ScanEvent, SearchEngine, Settings, SortColumn, SortOrder,
    export_files, media_duration,
};
use anyhow::{Context as _, bail};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

const HEADERS: [&str; 8] = ["Filename", "Duration", "Type", "Size", "Artist", "Album", "Genre", "Path"];

pub struct Context {
    settings: Settings,
    json: bool,
}

impl Context {
    pub fn new(settings: Settings, json: bool) -> Self {
        Self { settings, json }
    }

    fn open_db(&self) -> anyhow::Result<Database> {
        let path = &self.settings.database.path;
        Database::open(path).with_context(|| format!("failed to open index {}", path.display()))
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn print_records(&self, records: &[MediaRecord]) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(records);
        }
        print!("{}", render_table(records));
        println!("{} file(s)", records.len());
        Ok(())
    }
}

fn push_line<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

/// Left-aligned columns separated by two spaces
fn render_table(records: &[MediaRecord]) -> String {
    let rows: Vec<[String; 8]> = records.iter().map(display_row).collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &widths, HEADERS.iter().copied());
    for row in &rows {
        push_line(&mut out, &widths, row.iter().map(String::as_str));
    }
    out
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

pub fn scan(ctx: &Context, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let db = ctx.open_db()?;
    let coordinator = ScanCoordinator::new(db, ctx.settings.scan.clone());
    let events = coordinator.start(paths)?;

    let mut failure = None;
    for event in events {
        if ctx.json {
            println!("{}", serde_json::to_string(&event)?);
        }

        match event {
            ScanEvent::Progress(p) if !ctx.json => eprintln!("{} ({}%)", p.message, p.percent),
            ScanEvent::Progress(_) => {}
            ScanEvent::Completed(done) => {
                if !ctx.json {
                    let state = if done.cancelled { "cancelled" } else { "complete" };
                    println!(
                        "Scan {}: {} file(s) indexed in {:.1}s",
                        state,
                        done.stats.scanned,
                        done.duration_ms as f64 / 1000.0
                    );
                    if done.stats.extract_errors > 0 {
                        println!("{} file(s) skipped after extraction failures", done.stats.extract_errors);
                    }
                    if done.stats.store_errors > 0 {
                        println!("{} record(s) could not be stored", done.stats.store_errors);
                    }
                }
            }
            ScanEvent::Failed(f) => failure = Some(f.error),
        }
    }
    coordinator.wait()?;

    if let Some(error) = failure {
        bail!("scan failed: {}", error);
    }
    Ok(())
}

pub fn search(ctx: &Context, query: &str, limit: Option<usize>) -> anyhow::Result<()> {
    let engine = SearchEngine::new(ctx.open_db()?, ctx.settings.search.threshold);
    let limit = limit.unwrap_or(ctx.settings.search.limit);
    let results = engine.try_search(query, limit)?;
    ctx.print_records(&results)
}

pub fn list(ctx: &Context, sort: &str, desc: bool, limit: Option<usize>) -> anyhow::Result<()> {
    let db = ctx.open_db()?;
    let mut records = db.with_conn(library::get_all)?;

    let order = if desc { SortOrder::Desc } else { SortOrder::Asc };
    sort_records(&mut records, SortColumn::from_str(sort), order);
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    ctx.print_records(&records)
}

pub fn count(ctx: &Context) -> anyhow::Result<()> {
    let total = ctx.open_db()?.with_conn(library::count)?;
    if ctx.json {
        return ctx.print_json(&serde_json::json!({ "count": total }));
    }
    println!("{}", total);
    Ok(())
}

pub fn info(ctx: &Context, path: &Path) -> anyhow::Result<()> {
    let key = absolute(path).to_string_lossy().into_owned();
    let record = ctx
        .open_db()?
        .with_conn(|conn| library::get_by_path(conn, &key))?;

    let Some(r) = record else {
        bail!("{} is not in the index", key);
    };
    if ctx.json {
        return ctx.print_json(&r);
    }

    let fields = [
        ("Filename", r.filename.clone()),
        ("Path", r.path.clone()),
        ("Type", if r.is_video() { "Video" } else { "Audio" }.to_string()),
        ("Duration", format_duration(r.duration)),
        ("Size", format_size(r.size)),
        ("Modified", format_timestamp(r.last_modified)),
        ("Title", r.title.clone()),
        ("Artist", r.artist.clone()),
        ("Album", r.album.clone()),
        ("Genre", r.genre.clone()),
        ("Bitrate", format!("{} kbps", r.bitrate)),
        ("Sample rate", format!("{} Hz", r.sample_rate)),
        ("Channels", r.channels.to_string()),
    ];
    for (name, value) in fields {
        println!("{:<12} {}", format!("{}:", name), value);
    }
    Ok(())
}

pub fn remove(ctx: &Context, path: &Path) -> anyhow::Result<()> {
    let key = absolute(path).to_string_lossy().into_owned();
    let removed = ctx
        .open_db()?
        .with_conn(|conn| library::delete_by_path(conn, &key))?;

    if ctx.json {
        return ctx.print_json(&serde_json::json!({ "path": key, "removed": removed }));
    }
    if removed {
        println!("Removed {}", key);
    } else {
        println!("{} was not in the index", key);
    }
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub fn clear(ctx: &Context, yes: bool) -> anyhow::Result<()> {
    let db = ctx.open_db()?;
    let total = db.with_conn(library::count)?;

    if !yes && !confirm(&format!("Remove all {} record(s) from the index?", total))? {
        println!("Aborted");
        return Ok(());
    }

    db.clear()?;
    if ctx.json {
        return ctx.print_json(&serde_json::json!({ "cleared": total }));
    }
    println!("Cleared {} record(s)", total);
    Ok(())
}

pub fn export(ctx: &Context, dest: &Path, query: Option<&str>, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let mut sources = paths;
    if let Some(query) = query {
        let engine = SearchEngine::new(ctx.open_db()?, ctx.settings.search.threshold);
        let hits = engine.try_search(query, ctx.settings.search.limit)?;
        sources.extend(hits.into_iter().map(|r| PathBuf::from(r.path)));
    }
    if sources.is_empty() {
        bail!("nothing to export: pass file paths or --query");
    }

    let report = export_files(&sources, dest)?;
    if ctx.json {
        return ctx.print_json(&report);
    }

    for failure in &report.failed {
        eprintln!("failed: {} ({})", failure.path.display(), failure.reason);
    }
    println!(
        "Exported {}/{} file(s) to {}",
        report.written.len(),
        report.attempted(),
        dest.display()
    );
    Ok(())
}

pub fn duration(ctx: &Context, path: &Path) -> anyhow::Result<()> {
    let seconds = media_duration(path);
    if ctx.json {
        return ctx.print_json(&serde_json::json!({
            "path": path.display().to_string(),
            "duration": seconds,
        }));
    }
    println!("{} ({:.3}s)", format_duration(seconds), seconds);
    Ok(())
}
