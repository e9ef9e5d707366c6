//! The `rag` binary end to end against a mock Ollama backend.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{spawn_mock_ollama, MockState};
use tempfile::TempDir;

fn rag_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rag"))
}

fn setup_test_env(ollama_url: &str) -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let docs_dir = root.join("docs");
    fs::create_dir_all(docs_dir.join("europe")).unwrap();
    fs::write(
        docs_dir.join("europe/capitals.md"),
        "Paris is the capital of France.\nBerlin is the capital of Germany.",
    )
    .unwrap();
    fs::write(
        docs_dir.join("rivers.txt"),
        "The Seine flows through Paris.\nThe Danube flows through Vienna.",
    )
    .unwrap();
    fs::write(docs_dir.join("diagram.png"), [0x89u8, 0x50, 0x4e, 0x47]).unwrap();

    let config_content = format!(
        r#"[ollama]
url = "{}"

[embedding]
provider = "ollama"
model = "mock-embed"
max_retries = 0

[generation]
model = "mock-gen"

[reranker]
provider = "disabled"

[chunking]
chunk_size = 40
chunk_overlap = 0

[retrieval]
enable_reranking = false
max_contexts = 3

[logging]
level = "warn"
"#,
        ollama_url
    );
    let config_path = root.join("rag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, docs_dir)
}

async fn run_rag(cwd: &Path, config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rag_binary();
    let cwd = cwd.to_path_buf();
    let config_path = config_path.to_path_buf();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();

    let output = tokio::task::spawn_blocking(move || {
        Command::new(&binary)
            .current_dir(&cwd)
            .env_remove("OLLAMA_API_URL")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&config_path)
            .args(&args)
            .output()
            .unwrap_or_else(|e| panic!("Failed to run rag binary at {:?}: {}", binary, e))
    })
    .await
    .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_search_json() {
    let state = Arc::new(MockState::default());
    let url = spawn_mock_ollama(state.clone()).await;
    let (tmp, config, docs) = setup_test_env(&url);

    let (stdout, stderr, success) = run_rag(
        tmp.path(),
        &config,
        &["search", "capital of France", "--docs", docs.to_str().unwrap(), "--json"],
    )
    .await;
    assert!(success, "search failed: {}", stderr);

    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let results = results.as_array().unwrap();
    assert!(!results.is_empty());
    assert!(results.len() <= 3);
    assert!(results.iter().any(|r| r["passage"]["content"]
        .as_str()
        .unwrap()
        .contains("capital of France")));
    assert_eq!(results[0]["origin"], "graph");

    // HyDE went through the mock generator.
    assert_eq!(state.generate_calls.load(Ordering::SeqCst), 1);
    assert!(state.embed_calls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_search_text_without_hyde() {
    let state = Arc::new(MockState::default());
    let url = spawn_mock_ollama(state.clone()).await;
    let (tmp, config, docs) = setup_test_env(&url);

    let (stdout, stderr, success) = run_rag(
        tmp.path(),
        &config,
        &[
            "search",
            "Seine",
            "--docs",
            docs.to_str().unwrap(),
            "--no-hyde",
            "--no-graph",
            "--max-contexts",
            "1",
        ],
    )
    .await;
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.starts_with("1. ["), "unexpected output: {}", stdout);
    assert!(stdout.contains("rivers.txt"));
    assert!(!stdout.contains("2. ["));
    assert_eq!(state.generate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_streams_answer() {
    let state = Arc::new(MockState::default());
    let url = spawn_mock_ollama(state).await;
    let (tmp, config, docs) = setup_test_env(&url);

    let (stdout, stderr, success) = run_rag(
        tmp.path(),
        &config,
        &["ask", "Where is Paris?", "--docs", docs.to_str().unwrap()],
    )
    .await;
    assert!(success, "ask failed: {}", stderr);
    assert_eq!(stdout.trim(), "Hello from the mock model.");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_prints_fallback_when_generation_fails() {
    let state = Arc::new(MockState::default());
    let url = spawn_mock_ollama(state).await;
    let (tmp, config, docs) = setup_test_env(&url);

    let (stdout, stderr, success) = run_rag(
        tmp.path(),
        &config,
        &["ask", "FAIL please", "--docs", docs.to_str().unwrap(), "--no-hyde"],
    )
    .await;
    assert!(success, "ask failed: {}", stderr);
    assert_eq!(
        stdout.trim(),
        "Sorry, I encountered an error during generation."
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_config_fails() {
    let state = Arc::new(MockState::default());
    let url = spawn_mock_ollama(state).await;
    let (tmp, config, docs) = setup_test_env(&url);
    fs::write(&config, "[retrieval]\nlexical_weight = 0.9\n").unwrap();

    let (_, stderr, success) = run_rag(
        tmp.path(),
        &config,
        &["search", "x", "--docs", docs.to_str().unwrap()],
    )
    .await;
    assert!(!success);
    assert!(stderr.contains("invalid retrieval weights"), "stderr: {}", stderr);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_docs_path_fails() {
    let state = Arc::new(MockState::default());
    let url = spawn_mock_ollama(state).await;
    let (tmp, config, _) = setup_test_env(&url);

    let (_, stderr, success) = run_rag(
        tmp.path(),
        &config,
        &["search", "x", "--docs", "/no/such/dir"],
    )
    .await;
    assert!(!success);
    assert!(stderr.contains("does not exist"), "stderr: {}", stderr);
}
