/// Acceptance tests for the memobatch binary
///
/// Every test gets its own cache root and config file. The model endpoint
/// points at a closed local port, so anything not already cached fails fast
/// instead of reaching the network.
use assert_cmd::Command;
use memobatch::pipelines::Summary;
use memobatch::{CallArgs, MemoStore};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    fn new() -> Self {
        let workspace = Self {
            temp_dir: TempDir::new().unwrap(),
        };
        workspace.create_file(
            "memobatch.toml",
            r#"
[cache]
dir = "cache"

[llm]
base_url = "http://127.0.0.1:9/v1/"
model = "test-model"
timeout = "2s"

[observability]
log_level = "warn"
log_format = "compact"
"#,
        );
        workspace
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn cache_root(&self) -> PathBuf {
        self.path().join("cache")
    }

    fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn memobatch(&self) -> Command {
        let mut cmd = Command::new(std::env!("CARGO_BIN_EXE_memobatch"));
        cmd.current_dir(self.path())
            .env_remove("MEMOBATCH_CONFIG")
            .env_remove("MEMOBATCH_CACHE_DIR")
            .env_remove("MEMOBATCH_LOG_FORMAT")
            .env_remove("RUST_LOG")
            .env("XDG_CONFIG_HOME", self.path().join("xdg"));
        cmd
    }

    /// Store a summary exactly where the `summarize` command looks for it
    fn seed_summary(&self, account: &str, summary: &str) {
        let store = MemoStore::open(self.cache_root().join("summarize")).unwrap();
        let args = CallArgs::new()
            .named("account", account)
            .named("model", "test-model");
        store
            .get_or_compute("summarize", &args, || {
                Ok(Summary {
                    reasoning: String::new(),
                    summary: summary.to_string(),
                })
            })
            .unwrap();
    }
}

#[test]
fn test_config_example_is_valid_toml() {
    let workspace = TestWorkspace::new();

    let output = workspace
        .memobatch()
        .args(["config", "example"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[cache]"))
        .stdout(predicate::str::contains("[llm]"))
        .get_output()
        .stdout
        .clone();

    let path = workspace.create_file("example.toml", &String::from_utf8(output).unwrap());
    workspace
        .memobatch()
        .args(["config", "validate"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file is valid"));
}

#[test]
fn test_config_validate_rejects_bad_duration() {
    let workspace = TestWorkspace::new();
    let path = workspace.create_file("bad.toml", "[fetch]\ndelay = \"soon\"\n");

    workspace
        .memobatch()
        .args(["config", "validate"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("fetch.delay"));
}

#[test]
fn test_config_show_reports_discovered_file() {
    let workspace = TestWorkspace::new();

    workspace
        .memobatch()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("memobatch.toml"))
        .stdout(predicate::str::contains("test-model"));
}

#[test]
fn test_cache_stats_empty() {
    let workspace = TestWorkspace::new();

    workspace
        .memobatch()
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached operations."));
}

#[test]
fn test_cache_list_and_clear() {
    let workspace = TestWorkspace::new();
    workspace.seed_summary("first account", "first");
    workspace.seed_summary("second account", "second");

    workspace
        .memobatch()
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("summarize: 2 entries"));

    workspace
        .memobatch()
        .args(["cache", "list", "--verbose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("summarize (2 entries):"))
        .stdout(predicate::str::contains("Operation: summarize"));

    workspace
        .memobatch()
        .args(["cache", "clear"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--all"));

    workspace
        .memobatch()
        .args(["cache", "clear", "--operation", "summarize"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 2 entries"));

    workspace
        .memobatch()
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached entries."));
}

#[test]
fn test_cache_clear_rejects_path_like_operation() {
    let workspace = TestWorkspace::new();
    let sibling = workspace.create_file("notes.txt", "keep me");

    workspace
        .memobatch()
        .args(["cache", "clear", "--operation", ".."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid operation name"));

    workspace
        .memobatch()
        .args(["cache", "list", "--operation", "../x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid operation name"));

    assert!(sibling.exists());
}

#[test]
fn test_cache_dir_flag_overrides_config() {
    let workspace = TestWorkspace::new();
    let other = workspace.path().join("elsewhere");
    fs::create_dir_all(other.join("fetch")).unwrap();

    workspace
        .memobatch()
        .args(["cache", "--cache-dir"])
        .arg(&other)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch: 0 entries"));
}

#[test]
fn test_summarize_uses_cache_and_isolates_failures() {
    let workspace = TestWorkspace::new();
    workspace.seed_summary("a calm evening", "A calm evening.");
    workspace.seed_summary("met a guide", "The participant met a guide.");
    workspace.create_file(
        "accounts.csv",
        "experience_id,experience_account\n1,a calm evening\n2,never cached\n3,met a guide\n",
    );

    workspace
        .memobatch()
        .args([
            "summarize",
            "--input",
            "accounts.csv",
            "--output",
            "out/summaries.csv",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("processed 3 | succeeded 2 | failed 1"))
        .stderr(predicate::str::contains("Failed records: 2"));

    let written = fs::read_to_string(workspace.path().join("out/summaries.csv")).unwrap();
    assert_eq!(
        written,
        "experience_id,summary\n1,A calm evening.\n3,The participant met a guide.\n"
    );
}

#[test]
fn test_summarize_limit() {
    let workspace = TestWorkspace::new();
    workspace.seed_summary("a calm evening", "A calm evening.");
    workspace.create_file(
        "accounts.csv",
        "experience_id,experience_account\n1,a calm evening\n2,never cached\n",
    );

    workspace
        .memobatch()
        .args([
            "summarize",
            "-i",
            "accounts.csv",
            "-o",
            "limited.csv",
            "--limit",
            "1",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("processed 1 | succeeded 1 | failed 0"));
}

#[test]
fn test_missing_dataset_is_fatal() {
    let workspace = TestWorkspace::new();

    workspace
        .memobatch()
        .args(["summarize", "-i", "absent.csv", "-o", "out.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load dataset"));

    assert!(!workspace.path().join("out.csv").exists());
}

#[test]
fn test_missing_column_is_fatal() {
    let workspace = TestWorkspace::new();
    workspace.create_file("accounts.csv", "id,text\n1,hello\n");

    workspace
        .memobatch()
        .args(["summarize", "-i", "accounts.csv", "-o", "out.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("experience_id"));
}
