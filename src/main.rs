//! # RAG Harness CLI (`rag`)
//!
//! Indexes the documents given with `--docs` and either prints the ranked
//! passages for a query or answers questions with a local Ollama model.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag search "<query>" --docs <PATH>...` | Print ranked passages |
//! | `rag ask "<question>" --docs <PATH>...` | Answer one question |
//! | `rag chat --docs <PATH>...` | Interactive session on stdin |
//!
//! ## Examples
//!
//! ```bash
//! # Ranked passages as JSON, no query expansion
//! rag search "who founded the company" --docs ./notes --no-hyde --json
//!
//! # One-shot answer using a config file
//! rag --config ./rag.toml ask "Where is Paris?" --docs ./geo.txt
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use rag_harness::commands::{self, RetrievalFlags};
use rag_harness::config;
use rag_harness::logging;

/// RAG Harness CLI: hybrid retrieval and answering over local documents.
///
/// Without `--config`, built-in defaults are used. `OLLAMA_API_URL`
/// (also read from `.env`) overrides the Ollama address.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "RAG Harness: hybrid retrieval and answering over local documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command.
#[derive(Args)]
struct RetrievalArgs {
    /// Files or directories to index (directories are walked recursively).
    #[arg(long = "docs", required = true, num_args = 1..)]
    docs: Vec<PathBuf>,

    /// Disable HyDE query expansion.
    #[arg(long)]
    no_hyde: bool,

    /// Disable cross-encoder reranking.
    #[arg(long)]
    no_rerank: bool,

    /// Disable knowledge-graph augmentation.
    #[arg(long)]
    no_graph: bool,

    /// Maximum number of passages to return or feed to the model.
    #[arg(long)]
    max_contexts: Option<usize>,
}

impl RetrievalArgs {
    fn flags(&self) -> RetrievalFlags {
        RetrievalFlags {
            no_hyde: self.no_hyde,
            no_rerank: self.no_rerank,
            no_graph: self.no_graph,
            max_contexts: self.max_contexts,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the ranked passages for a query.
    Search {
        /// The search query string.
        query: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Answer a single question, streaming the answer to stdout.
    Ask {
        /// The question.
        question: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },

    /// Interactive chat over stdin. Type `exit` or press Ctrl-D to quit.
    Chat {
        #[command(flatten)]
        retrieval: RetrievalArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => {
            let mut cfg = config::Config::default();
            cfg.apply_env();
            cfg
        }
    };
    logging::init(&cfg.logging.level)?;

    match cli.command {
        Commands::Search {
            query,
            retrieval,
            json,
        } => {
            commands::run_search(&cfg, &query, &retrieval.docs, &retrieval.flags(), json).await?;
        }
        Commands::Ask {
            question,
            retrieval,
        } => {
            commands::run_ask(&cfg, &question, &retrieval.docs, &retrieval.flags()).await?;
        }
        Commands::Chat { retrieval } => {
            commands::run_chat(&cfg, &retrieval.docs, &retrieval.flags()).await?;
        }
    }

    Ok(())
}
