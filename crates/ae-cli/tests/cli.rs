// Drive the `ae` binary against a temporary index
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::{tempdir, TempDir};

struct Env {
    root: TempDir,
}

impl Env {
    fn new() -> Self {
        Self { root: tempdir().unwrap() }
    }

    fn media(&self) -> std::path::PathBuf {
        let dir = self.root.path().join("media");
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn ae(&self, args: &[&str]) -> Output {
        let db = self.root.path().join("index.db");
        Command::new(env!("CARGO_BIN_EXE_ae"))
            .arg("--db")
            .arg(&db)
            .args(args)
            .env("AE_CONFIG_PATH", self.root.path().join("missing.toml"))
            .env("RUST_LOG", "off")
            .output()
            .expect("failed to run ae")
    }
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "ae failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn write(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"not really media").unwrap();
}

#[test]
fn test_scan_count_search() {
    let env = Env::new();
    let media = env.media();
    write(&media, "The Band - Opener.mp3");
    write(&media, "solo.wav");
    write(&media, "cover.png");

    let out = stdout(&env.ae(&["scan", media.to_str().unwrap()]));
    assert!(out.contains("2 file(s) indexed"), "unexpected output: {}", out);

    assert_eq!(stdout(&env.ae(&["count"])).trim(), "2");

    let json = stdout(&env.ae(&["--json", "search", "band"]));
    let hits: serde_json::Value = serde_json::from_str(&json).unwrap();
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["filename"], "The Band - Opener.mp3");
}

#[test]
fn test_info_remove_clear() {
    let env = Env::new();
    let media = env.media();
    write(&media, "clip.mkv");
    write(&media, "song.ogg");
    stdout(&env.ae(&["scan", media.to_str().unwrap()]));

    let clip = media.join("clip.mkv");
    let info = stdout(&env.ae(&["info", clip.to_str().unwrap()]));
    assert!(info.contains("Video"));
    assert!(info.contains("clip.mkv"));

    let removed = stdout(&env.ae(&["--json", "remove", clip.to_str().unwrap()]));
    assert!(removed.contains("\"removed\": true"));
    assert!(!env.ae(&["info", clip.to_str().unwrap()]).status.success());

    stdout(&env.ae(&["clear", "--yes"]));
    assert_eq!(stdout(&env.ae(&["count"])).trim(), "0");
}

#[test]
fn test_export_by_query() {
    let env = Env::new();
    let media = env.media();
    write(&media, "keep-me.flac");
    write(&media, "other.mp3");
    stdout(&env.ae(&["scan", media.to_str().unwrap()]));

    let dest = env.root.path().join("out");
    let out = stdout(&env.ae(&["export", dest.to_str().unwrap(), "--query", "keep"]));
    assert!(out.contains("Exported 1/1"), "unexpected output: {}", out);
    assert!(dest.join("keep-me.flac").is_file());
    assert!(!dest.join("other.mp3").exists());
}

#[test]
fn test_list_sorted_descending() {
    let env = Env::new();
    let media = env.media();
    write(&media, "alpha.mp3");
    write(&media, "beta.mp3");
    stdout(&env.ae(&["scan", media.to_str().unwrap()]));

    let json = stdout(&env.ae(&["--json", "list", "--sort", "filename", "--desc"]));
    let records: serde_json::Value = serde_json::from_str(&json).unwrap();
    let names: Vec<&str> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["filename"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["beta.mp3", "alpha.mp3"]);
}
