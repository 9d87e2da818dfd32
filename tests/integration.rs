use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn keepsake_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("keepsake");
    path
}

const ENV_VARS: [&str; 6] = [
    "KEEPSAKE_SOURCE",
    "KEEPSAKE_AUX",
    "KEEPSAKE_AUX_PARENT",
    "KEEPSAKE_OUT",
    "KEEPSAKE_OVERRIDES",
    "KEEPSAKE_LOG",
];

fn setup_test_env() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("source");

    write(&source, "01 2024-03-01 家书/dear mom.txt", "Dear mom, all is well here.");
    write(&source, "02 笔记/2023-11-02 清单.md", "# 清单\n\n- milk\n- eggs");
    write(&source, "misc/recipe.txt", "a recipe for dumplings");

    tmp
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Run the binary in `dir` with a clean `KEEPSAKE_*` environment.
fn run_keepsake(dir: &Path, args: &[&str], env: &[(&str, &str)]) -> Output {
    let binary = keepsake_binary();
    let mut cmd = Command::new(&binary);
    cmd.current_dir(dir).args(args);
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output()
        .unwrap_or_else(|e| panic!("Failed to run keepsake binary at {:?}: {}", binary, e))
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_string()
}

#[test]
fn test_ingest_prints_one_line_summary() {
    let tmp = setup_test_env();
    let output = run_keepsake(
        tmp.path(),
        &["--source", "source", "--out", "data", "--progress", "off"],
        &[],
    );
    let stdout = text(&output.stdout);
    assert!(
        output.status.success(),
        "ingest failed: stdout={}, stderr={}",
        stdout,
        text(&output.stderr)
    );
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.starts_with("ingested 3 documents: 2 dated, 1 undated, 1 for review"));
    assert!(stdout.contains("letters 1"));
    assert!(stdout.contains("memo 1"));
    assert!(stdout.contains("unclassified 1"));

    let data = tmp.path().join("data");
    assert!(data.join("index.json").exists());
    assert!(data.join("review.json").exists());
    assert!(data.join("overrides.json").exists());
    assert!(data.join("views").join("letters.json").exists());
    assert_eq!(fs::read_dir(data.join("content")).unwrap().count(), 3);
}

#[test]
fn test_missing_source_exits_with_error() {
    let tmp = TempDir::new().unwrap();
    let output = run_keepsake(tmp.path(), &["--source", "nowhere", "--out", "data"], &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(text(&output.stderr).contains("source root does not exist"));
    assert!(output.stdout.is_empty());
    assert!(!tmp.path().join("data").exists());
}

#[test]
fn test_malformed_overrides_exits_with_error() {
    let tmp = setup_test_env();
    write(tmp.path(), "data/overrides.json", "{\"overrides\": \"nope\"}");
    let output = run_keepsake(tmp.path(), &["--source", "source", "--out", "data"], &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(text(&output.stderr).contains("overrides file is malformed"));
    assert!(!tmp.path().join("data").join("index.json").exists());
}

#[test]
fn test_env_fallback_and_flag_precedence() {
    let tmp = setup_test_env();
    write(&tmp.path().join("other"), "only.txt", "diary");

    let output = run_keepsake(
        tmp.path(),
        &[],
        &[("KEEPSAKE_SOURCE", "source"), ("KEEPSAKE_OUT", "env-out")],
    );
    assert!(output.status.success(), "stderr={}", text(&output.stderr));
    assert!(text(&output.stdout).starts_with("ingested 3 documents"));
    assert!(tmp.path().join("env-out").join("index.json").exists());

    let output = run_keepsake(
        tmp.path(),
        &["--source", "other"],
        &[("KEEPSAKE_SOURCE", "source"), ("KEEPSAKE_OUT", "env-out")],
    );
    assert!(output.status.success(), "stderr={}", text(&output.stderr));
    assert!(text(&output.stdout).starts_with("ingested 1 documents"));
}

#[test]
fn test_aux_mounts_from_flags() {
    let tmp = setup_test_env();
    write(&tmp.path().join("scans"), "2021-05-05 diary.txt", "scanned");

    let output = run_keepsake(
        tmp.path(),
        &[
            "--source",
            "source",
            "--out",
            "data",
            "--aux",
            "scans=scans",
            "--aux",
            "gone=does-not-exist",
        ],
        &[],
    );
    assert!(output.status.success(), "stderr={}", text(&output.stderr));
    assert!(text(&output.stdout).starts_with("ingested 4 documents"));

    let index: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("data/index.json")).unwrap())
            .unwrap();
    let paths: Vec<&str> = index["docs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["sourceRelPath"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"extras/scans/2021-05-05 diary.txt"));
}

#[test]
fn test_config_file_supplies_defaults() {
    let tmp = setup_test_env();
    write(
        tmp.path(),
        "config/keepsake.toml",
        "[source]\nroot = \"source\"\n\n[output]\ndir = \"from-config\"\n",
    );

    let output = run_keepsake(tmp.path(), &[], &[]);
    assert!(output.status.success(), "stderr={}", text(&output.stderr));
    assert!(tmp.path().join("from-config").join("index.json").exists());

    let output = run_keepsake(tmp.path(), &["--out", "from-flag"], &[]);
    assert!(output.status.success(), "stderr={}", text(&output.stderr));
    assert!(tmp.path().join("from-flag").join("index.json").exists());
}

#[test]
fn test_invalid_or_missing_config_is_fatal() {
    let tmp = setup_test_env();
    let output = run_keepsake(tmp.path(), &["--config", "missing.toml"], &[]);
    assert_eq!(output.status.code(), Some(1));

    write(
        tmp.path(),
        "bad.toml",
        "[policy.birthday]\nmonth = 13\n",
    );
    let output = run_keepsake(tmp.path(), &["--config", "bad.toml", "--source", "source"], &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(text(&output.stderr).contains("policy.birthday.month"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let tmp = setup_test_env();
    let output = run_keepsake(
        tmp.path(),
        &["--source", "source", "--out", "data", "--dry-run"],
        &[],
    );
    assert!(output.status.success(), "stderr={}", text(&output.stderr));
    assert!(text(&output.stdout).trim_end().ends_with("(dry run)"));
    assert!(!tmp.path().join("data").exists());
}

#[test]
fn test_json_progress_goes_to_stderr() {
    let tmp = setup_test_env();
    let output = run_keepsake(
        tmp.path(),
        &["--source", "source", "--out", "data", "--progress", "json"],
        &[],
    );
    assert!(output.status.success());
    let stderr = text(&output.stderr);
    assert!(stderr.contains("\"phase\":\"discovering\""));
    assert!(stderr.contains("\"phase\":\"processing\""));
    assert!(stderr.contains("\"phase\":\"writing\""));
    assert!(!text(&output.stdout).contains("phase"));
}

#[test]
fn test_rerun_keeps_index_stable() {
    let tmp = setup_test_env();
    let args = ["--source", "source", "--out", "data"];
    let read_index = || {
        let raw = fs::read_to_string(tmp.path().join("data/index.json")).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        value.as_object_mut().unwrap().remove("generatedAt");
        value
    };

    assert!(run_keepsake(tmp.path(), &args, &[]).status.success());
    let first = read_index();
    assert!(run_keepsake(tmp.path(), &args, &[]).status.success());
    assert_eq!(first, read_index());
}
