use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rlens_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("rlens");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Review export with three reviews for product P and one for Q.
    fs::write(
        root.join("export.json"),
        r#"{"reviews": [
            {"id": "r1", "subject": {"identifier": "P"}, "comment": "Great fabric quality",
             "rating": {"code": "5"}, "author": {"username": "ayse"}},
            {"id": "r2", "subject": {"identifier": "P"}, "comment": "Fabric quality is great",
             "rating": {"code": "4"}},
            {"id": "r3", "subject": {"identifier": "P"}, "comment": "Zipper broke"},
            {"id": "r4", "subject": {"identifier": "Q"}, "comment": "Different product"}
        ]}"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/rlens.sqlite"

[clustering]
cluster_count = 10
top_k = 5

[pipeline]
batch_limit = 50
"#,
        root.display()
    );

    let config_path = config_dir.join("rlens.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rlens(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rlens_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rlens binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn export_path(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("export.json")
        .display()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rlens(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_rlens(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_rlens(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_filters_by_product() {
    let (_tmp, config_path) = setup_test_env();
    let export = export_path(&config_path);

    run_rlens(&config_path, &["init"]);
    let (stdout, stderr, success) =
        run_rlens(&config_path, &["ingest", &export, "--product", "P"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("matched in export: 3"));
    assert!(stdout.contains("newly inserted: 3"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_idempotent_no_duplicates() {
    let (_tmp, config_path) = setup_test_env();
    let export = export_path(&config_path);

    run_rlens(&config_path, &["init"]);

    let (stdout1, _, _) = run_rlens(&config_path, &["ingest", &export, "--product", "P"]);
    assert!(stdout1.contains("newly inserted: 3"));

    // Re-ingesting the same export adds nothing.
    let (stdout2, _, _) = run_rlens(&config_path, &["ingest", &export, "--product", "P"]);
    assert!(stdout2.contains("matched in export: 3"));
    assert!(stdout2.contains("newly inserted: 0"));
}

#[test]
fn test_stats_reports_pending_reviews() {
    let (_tmp, config_path) = setup_test_env();
    let export = export_path(&config_path);

    run_rlens(&config_path, &["init"]);
    run_rlens(&config_path, &["ingest", &export, "--product", "P"]);

    let (stdout, _, success) = run_rlens(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Reviews:    3"));
    assert!(stdout.contains("Analyzed:   0"));
    assert!(stdout.contains("P"));
}

#[test]
fn test_analyze_errors_when_extractor_disabled() {
    let (_tmp, config_path) = setup_test_env();

    run_rlens(&config_path, &["init"]);
    let (_, stderr, success) = run_rlens(&config_path, &["analyze", "--product", "P"]);
    assert!(!success, "analyze should fail with disabled extractor");
    assert!(
        stderr.contains("disabled"),
        "Should mention disabled, got: {}",
        stderr
    );
}

#[test]
fn test_summarize_nothing_to_summarize() {
    let (_tmp, config_path) = setup_test_env();
    let export = export_path(&config_path);

    run_rlens(&config_path, &["init"]);
    run_rlens(&config_path, &["ingest", &export, "--product", "P"]);

    // Reviews exist but none are analyzed: no summary row is written.
    let (stdout, _, success) = run_rlens(&config_path, &["summarize", "--product", "P"]);
    assert!(success);
    assert!(stdout.contains("nothing to summarize"));

    let (_, stderr, success) = run_rlens(&config_path, &["summary", "P"]);
    assert!(!success, "summary lookup should fail before a summary exists");
    assert!(stderr.contains("no summary"));
}

#[test]
fn test_summary_missing_product() {
    let (_tmp, config_path) = setup_test_env();

    run_rlens(&config_path, &["init"]);
    let (_, stderr, success) = run_rlens(&config_path, &["summary", "nonexistent"]);
    assert!(!success, "summary for missing product should fail");
    assert!(
        stderr.contains("no summary"),
        "Should report missing summary, got: {}",
        stderr
    );
}

#[test]
fn test_malformed_export_aborts() {
    let (tmp, config_path) = setup_test_env();
    let bad = tmp.path().join("bad.json");
    fs::write(&bad, "{not json").unwrap();

    run_rlens(&config_path, &["init"]);
    let (_, stderr, success) = run_rlens(
        &config_path,
        &["ingest", bad.to_str().unwrap(), "--product", "P"],
    );
    assert!(!success, "malformed export should abort ingestion");
    assert!(stderr.contains("Malformed"));
}

#[test]
fn test_unknown_config_provider_rejected() {
    let (tmp, config_path) = setup_test_env();

    let config_content = format!(
        r#"[db]
path = "{}/data/rlens.sqlite"

[extractor]
provider = "telegraph"
model = "morse-1"
"#,
        tmp.path().display()
    );
    fs::write(&config_path, config_content).unwrap();

    let (_, stderr, success) = run_rlens(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("Unknown extractor provider"));
}
