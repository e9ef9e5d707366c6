//! BM25 (Okapi) lexical index over passage texts.
//!
//! Both the corpus and every query go through [`normalize`], so term
//! statistics computed at build time always line up with query terms.
//!
//! # Scoring
//!
//! ```text
//!                         tf × (k1 + 1)
//! score(q, d) = Σ idf(t) ──────────────────────────────
//!               t∈q      tf + k1 × (1 - b + b × |d|/avgdl)
//!
//! idf(t) = ln((N - n_t + 0.5) / (n_t + 0.5))
//! ```
//!
//! Terms appearing in more than half the corpus get a negative raw IDF;
//! those are floored to `epsilon × mean(idf)` so they still contribute a
//! small positive weight.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::BuildError;
use crate::models::Passage;

/// BM25 tuning constants.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

fn non_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\W+").expect("static regex is valid"))
}

/// Tokenize text for lexical indexing and querying.
///
/// Collapses runs of non-word characters to a single space, lower-cases,
/// and splits on whitespace.
pub fn normalize(text: &str) -> Vec<String> {
    non_word()
        .replace_all(text, " ")
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// In-memory BM25 index. Positions refer to the passage slice the index
/// was built from.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    params: Bm25Params,
    doc_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    avgdl: f64,
    idf: HashMap<String, f64>,
}

impl LexicalIndex {
    /// Build an index with default BM25 parameters.
    pub fn build(passages: &[Passage]) -> Result<Self, BuildError> {
        Self::build_with(passages, Bm25Params::default())
    }

    pub fn build_with(passages: &[Passage], params: Bm25Params) -> Result<Self, BuildError> {
        if passages.is_empty() {
            return Err(BuildError::EmptyCorpus);
        }

        let mut doc_freqs = Vec::with_capacity(passages.len());
        let mut doc_lens = Vec::with_capacity(passages.len());
        let mut containing: HashMap<String, usize> = HashMap::new();

        for passage in passages {
            let tokens = normalize(&passage.content);
            doc_lens.push(tokens.len());

            let mut freqs: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_default() += 1;
            }
            for term in freqs.keys() {
                *containing.entry(term.clone()).or_default() += 1;
            }
            doc_freqs.push(freqs);
        }

        let corpus_size = passages.len() as f64;
        let avgdl = doc_lens.iter().sum::<usize>() as f64 / corpus_size;

        let mut idf: HashMap<String, f64> = HashMap::with_capacity(containing.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, n) in containing {
            let n = n as f64;
            let value = ((corpus_size - n + 0.5) / (n + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, value);
        }

        let floor = params.epsilon * idf_sum / idf.len().max(1) as f64;
        for term in negative {
            idf.insert(term, floor);
        }

        Ok(Self {
            params,
            doc_freqs,
            doc_lens,
            avgdl,
            idf,
        })
    }

    /// Number of indexed passages.
    pub fn len(&self) -> usize {
        self.doc_lens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lens.is_empty()
    }

    /// BM25 score of every passage for `query`, in corpus order.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let terms = normalize(query);
        let Bm25Params { k1, b, .. } = self.params;

        self.doc_freqs
            .iter()
            .zip(&self.doc_lens)
            .map(|(freqs, &len)| {
                let norm = if self.avgdl > 0.0 {
                    1.0 - b + b * len as f64 / self.avgdl
                } else {
                    1.0
                };
                terms
                    .iter()
                    .map(|term| {
                        let tf = freqs.get(term).copied().unwrap_or(0) as f64;
                        let idf = self.idf.get(term).copied().unwrap_or(0.0);
                        idf * (tf * (k1 + 1.0)) / (tf + k1 * norm)
                    })
                    .fold(0.0, |acc, s| acc + s)
            })
            .collect()
    }

    /// Top `k` passages as `(position, score)`, best first.
    ///
    /// Like the classic BM25 retriever, the top `k` are returned even when
    /// their score is zero. Equal scores keep corpus order.
    pub fn search(&self, query: &str, k: usize) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = self.scores(query).into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);
        ranked
    }
}
