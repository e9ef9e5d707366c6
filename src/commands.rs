//! Implementations of the `rag` subcommands.
//!
//! Each command loads the documents given with `--docs`, builds a fresh
//! retrieval service over them, then answers from it.

use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use rag_harness_core::generation::Generator;
use rag_harness_core::models::RankedCandidate;

use crate::chat::ChatEngine;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::OllamaGenerator;
use crate::ingest::load_paths;
use crate::rerank::create_scorer;
use crate::service::{IngestOutcome, QueryOptions, RetrievalService, ServiceOptions};

/// Per-run overrides of the `[retrieval]` toggles.
#[derive(Debug, Clone, Default)]
pub struct RetrievalFlags {
    pub no_hyde: bool,
    pub no_rerank: bool,
    pub no_graph: bool,
    pub max_contexts: Option<usize>,
}

async fn build_service(
    cfg: &Config,
    docs: &[PathBuf],
    flags: &RetrievalFlags,
) -> Result<(Arc<RetrievalService>, Arc<dyn Generator>)> {
    let generator: Arc<dyn Generator> = Arc::new(OllamaGenerator::from_config(cfg)?);
    let service = RetrievalService::new(
        create_embedder(cfg)?,
        generator.clone(),
        create_scorer(cfg)?,
        ServiceOptions::from_config(cfg)?,
    );

    let mut settings = service.settings();
    settings.enable_hyde &= !flags.no_hyde;
    settings.enable_reranking &= !flags.no_rerank;
    settings.enable_graph_rag &= !flags.no_graph;
    if let Some(n) = flags.max_contexts {
        anyhow::ensure!(n >= 1, "--max-contexts must be >= 1");
        settings.max_contexts = n;
    }
    service.update_settings(settings);

    let documents = load_paths(docs)?;
    match service.ingest(documents).await? {
        IngestOutcome::Built {
            documents,
            passages,
        } => eprintln!("Indexed {} documents ({} passages).", documents, passages),
        other => tracing::warn!(outcome = ?other, "unexpected ingest outcome"),
    }

    Ok((Arc::new(service), generator))
}

/// `rag search`: print the ranked passages for `query`.
pub async fn run_search(
    cfg: &Config,
    query: &str,
    docs: &[PathBuf],
    flags: &RetrievalFlags,
    json: bool,
) -> Result<()> {
    let (service, _) = build_service(cfg, docs, flags).await?;
    let results = service.query(query, &QueryOptions::default()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&results);
    }
    Ok(())
}

fn print_results(results: &[RankedCandidate]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, result) in results.iter().enumerate() {
        let source = result.passage.source_id.as_deref().unwrap_or("(graph)");
        println!(
            "{}. [{:.4}] {} #{}",
            i + 1,
            result.score,
            source,
            result.passage.chunk_index
        );
        println!(
            "    excerpt: \"{}\"",
            excerpt(&result.passage.content, 240)
        );
        println!("    id: {}", result.passage.id);
        println!();
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat.to_string(),
    }
}

fn stream_to_stdout(token: &str) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(token.as_bytes());
    let _ = out.flush();
}

/// Answer one turn, streaming tokens to stdout.
///
/// When the engine falls back (generation failed, possibly mid-stream),
/// the returned answer differs from what was streamed and is printed on
/// its own line.
async fn answer_to_stdout(engine: &ChatEngine, session: &str, question: &str) {
    let mut streamed = String::new();
    let answer = engine
        .answer(session, question, |token| {
            stream_to_stdout(token);
            streamed.push_str(token);
        })
        .await;
    if answer != streamed {
        if !streamed.is_empty() {
            println!();
        }
        print!("{}", answer);
    }
    println!();
}

/// `rag ask`: answer one question, streaming to stdout.
pub async fn run_ask(
    cfg: &Config,
    question: &str,
    docs: &[PathBuf],
    flags: &RetrievalFlags,
) -> Result<()> {
    let (service, generator) = build_service(cfg, docs, flags).await?;
    let engine = ChatEngine::new(
        service,
        generator,
        cfg.generation.history_window,
        cfg.generation.context_window,
    );

    let session = uuid::Uuid::new_v4().to_string();
    answer_to_stdout(&engine, &session, question).await;
    Ok(())
}

/// `rag chat`: interactive session over stdin. `exit` or EOF ends it.
pub async fn run_chat(cfg: &Config, docs: &[PathBuf], flags: &RetrievalFlags) -> Result<()> {
    let (service, generator) = build_service(cfg, docs, flags).await?;
    let engine = ChatEngine::new(
        service,
        generator,
        cfg.generation.history_window,
        cfg.generation.context_window,
    );

    let session = uuid::Uuid::new_v4().to_string();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }
        answer_to_stdout(&engine, &session, question).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_flattens_and_truncates() {
        assert_eq!(excerpt(" a\nb ", 10), "a b");
        assert_eq!(excerpt("abcdef", 3), "abc…");
        assert_eq!(excerpt("héllo", 2), "hé…");
    }
}
