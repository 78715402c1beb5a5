use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn ragpipe_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ragpipe");
    path
}

/// A port nothing listens on.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("nested")).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    )
    .unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.\n\nDeep learning frameworks like PyTorch are covered.",
    )
    .unwrap();
    fs::write(
        files_dir.join("nested").join("gamma.txt"),
        "Gamma plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.",
    )
    .unwrap();
    fs::write(files_dir.join("main.rs"), "fn main() {}").unwrap();

    let config_content = format!(
        r#"[store]
host = "127.0.0.1"
http_port = {}
timeout_secs = 2

[chunking]
max_tokens = 20
overlap_tokens = 4

[retrieval]
collection = "Docs"
default_k = 3
"#,
        closed_port()
    );
    let config_path = config_dir.join("ragpipe.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(ragpipe_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run ragpipe")
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(ragpipe_binary())
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["ingest", "query", "status", "chunk"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn test_chunk_command_prints_plan() {
    let (tmp, config) = setup_test_env();
    let file = tmp.path().join("files").join("alpha.md");

    let output = run(&config, &["chunk", file.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    // 117 characters in 80-char windows.
    assert!(stdout.contains("2 chunk(s)"), "stdout: {stdout}");
    assert!(stdout.contains("#0 "));
    assert!(stdout.contains("#1 "));
}

#[test]
fn test_chunk_works_without_config_file() {
    let (tmp, _) = setup_test_env();
    let file = tmp.path().join("files").join("beta.md");
    let missing = tmp.path().join("nope.toml");

    let output = run(&missing, &["chunk", file.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("1 chunk(s)"));
}

#[test]
fn test_ingest_dry_run_counts_matching_files() {
    let (tmp, config) = setup_test_env();
    let dir = tmp.path().join("files");

    let output = run(&config, &["ingest", dir.to_str().unwrap(), "--dry-run"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("(dry-run)"));
    assert!(stdout.contains("documents found: 3"), "stdout: {stdout}");
}

#[test]
fn test_query_against_unreachable_store_fails() {
    let (_tmp, config) = setup_test_env();

    let output = run(&config, &["query", "rust cargo"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unreachable"), "stderr: {stderr}");
}

#[test]
fn test_query_rejects_unknown_mode() {
    let (_tmp, config) = setup_test_env();

    let output = run(&config, &["query", "rust", "--mode", "fuzzy"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown mode"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config) = setup_test_env();
    fs::write(&config, "[retrieval]\nfetch_multiplier = 0\n").unwrap();

    let output = run(&config, &["status"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("fetch_multiplier"));
}
