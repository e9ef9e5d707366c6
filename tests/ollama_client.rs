//! Ollama clients against a mock HTTP server.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{bag_of_words, spawn_mock_ollama, MockState};
use rag_harness::config::Config;
use rag_harness::embedding::OllamaEmbedder;
use rag_harness::generation::OllamaGenerator;
use rag_harness::ollama::OllamaClient;
use rag_harness_core::embedding::Embedder;
use rag_harness_core::generation::{collect_tokens, generate_text, GenerateOptions, Generator};

fn client(url: &str, retries: u32) -> OllamaClient {
    OllamaClient::new(url, Duration::from_secs(5), retries)
        .unwrap()
        .with_retry_base(Duration::from_millis(5))
}

#[tokio::test]
async fn test_embed_returns_one_vector_per_input() {
    let state = Arc::new(MockState::default());
    let url = spawn_mock_ollama(state.clone()).await;
    let embedder = OllamaEmbedder::new(client(&url, 0), "nomic-embed-text");

    let texts = vec!["Paris is in France".to_string(), "Rome".to_string()];
    let vectors = embedder.embed(&texts).await.unwrap();
    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[0], bag_of_words("Paris is in France"));
    assert_eq!(state.embed_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_embed_retries_server_errors() {
    let state = Arc::new(MockState::default());
    state.embed_failures.store(2, Ordering::SeqCst);
    let url = spawn_mock_ollama(state.clone()).await;
    let embedder = OllamaEmbedder::new(client(&url, 3), "nomic-embed-text");

    let vector = embedder.embed_one("retry me").await.unwrap();
    assert_eq!(vector, bag_of_words("retry me"));
    assert_eq!(state.embed_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_embed_gives_up_after_max_retries() {
    let state = Arc::new(MockState::default());
    state.embed_failures.store(10, Ordering::SeqCst);
    let url = spawn_mock_ollama(state.clone()).await;
    let embedder = OllamaEmbedder::new(client(&url, 1), "nomic-embed-text");

    let err = embedder.embed_one("x").await.unwrap_err();
    assert!(err.to_string().contains("503"));
    assert_eq!(state.embed_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_embed_client_error_is_not_retried() {
    let state = Arc::new(MockState::default());
    state.embed_not_found.store(true, Ordering::SeqCst);
    let url = spawn_mock_ollama(state.clone()).await;
    let embedder = OllamaEmbedder::new(client(&url, 3), "missing-model");

    assert!(embedder.embed_one("x").await.is_err());
    assert_eq!(state.embed_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_refused_is_an_error() {
    // Bind and drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let embedder = OllamaEmbedder::new(client(&format!("http://{}", addr), 0), "m");
    let err = embedder.embed_one("x").await.unwrap_err();
    assert!(err.to_string().contains("is Ollama running"));
}

#[tokio::test]
async fn test_generate_streams_until_done() {
    let state = Arc::new(MockState::default());
    let url = spawn_mock_ollama(state.clone()).await;
    let generator = OllamaGenerator::new(client(&url, 0), "qwen3:1.7b");

    let stream = generator
        .generate("Say hello", &GenerateOptions::default())
        .await
        .unwrap();
    let mut fragments = Vec::new();
    let answer = collect_tokens(stream, |t| fragments.push(t.to_string()))
        .await
        .unwrap();

    assert_eq!(answer, "Hello from the mock model.");
    assert_eq!(fragments.len(), 5);
    assert_eq!(state.generate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_generate_error_line_fails() {
    let state = Arc::new(MockState::default());
    let url = spawn_mock_ollama(state).await;
    let generator = OllamaGenerator::new(client(&url, 0), "qwen3:1.7b");

    let err = generate_text(&generator, "please FAIL", &GenerateOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("model crashed"));
}

#[tokio::test]
async fn test_generator_uses_generation_retry_budget() {
    let state = Arc::new(MockState::default());
    state.generate_failures.store(1, Ordering::SeqCst);
    let url = spawn_mock_ollama(state.clone()).await;

    let mut config = Config::default();
    config.ollama.url = url;
    config.embedding.max_retries = 0;
    config.generation.max_retries = 1;
    let generator = OllamaGenerator::from_config(&config).unwrap();

    let answer = generate_text(&generator, "Say hello", &GenerateOptions::default())
        .await
        .unwrap();
    assert_eq!(answer, "Hello from the mock model.");
    assert_eq!(state.generate_calls.load(Ordering::SeqCst), 2);
}
