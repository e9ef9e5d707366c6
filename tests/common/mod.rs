//! In-process mock of the Ollama HTTP API.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

/// Request counters and failure injection.
#[derive(Default)]
pub struct MockState {
    pub embed_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    /// Number of upcoming `/api/embed` requests answered with 503.
    pub embed_failures: AtomicUsize,
    /// Number of upcoming `/api/generate` requests answered with 503.
    pub generate_failures: AtomicUsize,
    /// Answer `/api/embed` with 404 instead.
    pub embed_not_found: std::sync::atomic::AtomicBool,
}

/// Hashed bag-of-words vector, 32 dimensions.
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 32];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
            % v.len();
        v[bucket] += 1.0;
    }
    v
}

async fn embed(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.embed_calls.fetch_add(1, Ordering::SeqCst);

    if state.embed_not_found.load(Ordering::SeqCst) {
        return (StatusCode::NOT_FOUND, "model not found").into_response();
    }
    let pending = state.embed_failures.load(Ordering::SeqCst);
    if pending > 0 {
        state.embed_failures.store(pending - 1, Ordering::SeqCst);
        return (StatusCode::SERVICE_UNAVAILABLE, "loading model").into_response();
    }

    let inputs: Vec<String> = body["input"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let embeddings: Vec<Vec<f32>> = inputs.iter().map(|t| bag_of_words(t)).collect();
    Json(json!({ "model": body["model"], "embeddings": embeddings })).into_response()
}

async fn generate(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.generate_calls.fetch_add(1, Ordering::SeqCst);

    let pending = state.generate_failures.load(Ordering::SeqCst);
    if pending > 0 {
        state.generate_failures.store(pending - 1, Ordering::SeqCst);
        return (StatusCode::SERVICE_UNAVAILABLE, "loading model").into_response();
    }

    let prompt = body["prompt"].as_str().unwrap_or_default();
    if prompt.contains("FAIL") {
        let line = json!({ "error": "model crashed" });
        return ndjson(vec![line]);
    }

    let answer = if prompt.starts_with("Generate a hypothetical answer to:") {
        "The capital of France is Paris."
    } else {
        "Hello from the mock model."
    };

    let mut lines: Vec<Value> = answer
        .split_inclusive(' ')
        .map(|t| json!({ "model": body["model"], "response": t, "done": false }))
        .collect();
    lines.push(json!({ "model": body["model"], "response": "", "done": true }));
    // Anything after `done` must be ignored.
    lines.push(json!({ "model": body["model"], "response": " trailing", "done": false }));
    ndjson(lines)
}

fn ndjson(lines: Vec<Value>) -> Response {
    let mut body = String::new();
    for line in lines {
        body.push_str(&line.to_string());
        body.push('\n');
    }
    ([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response()
}

/// Start the mock on an ephemeral port; returns its base URL.
pub async fn spawn_mock_ollama(state: Arc<MockState>) -> String {
    let app = Router::new()
        .route("/api/embed", post(embed))
        .route("/api/generate", post(generate))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
