//! Entity co-occurrence knowledge graph.
//!
//! ## Build
//!
//! Entities are runs of one or more capitalized words
//! (`\b[A-Z][a-z]+(?: [A-Z][a-z]+)*\b`). Within a passage, each entity is
//! linked to the next one in extraction order, so a passage yielding
//! `[A, B, C]` contributes the path `A–B–C` and never `A–C`. Passages with
//! fewer than two entities contribute no edges.
//!
//! Nodes are keyed by the exact extracted string: `Paris` and `PARIS` are
//! different nodes. Edges are undirected and presence-only.
//!
//! ## Query
//!
//! The query is lower-cased and split on whitespace. A node matches when
//! its lower-cased name contains any query word as a substring. The
//! neighbours of every matched node are concatenated (duplicates kept) and
//! truncated to `top_k`. This is a broad-recall heuristic: short words
//! match many nodes.
//!
//! Node order and each node's neighbour order are insertion order, so
//! results are deterministic for identical input.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::Passage;

fn entity_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Z][a-z]+(?: [A-Z][a-z]+)*\b").expect("static regex is valid")
    })
}

/// Extract entity spans from `text`, in order of appearance.
pub fn extract_entities(text: &str) -> Vec<&str> {
    entity_pattern().find_iter(text).map(|m| m.as_str()).collect()
}

/// Undirected graph of entity names with insertion-ordered adjacency.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<usize>>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from passages.
    pub fn build(passages: &[Passage]) -> Self {
        let mut graph = Self::new();
        for passage in passages {
            let entities = extract_entities(&passage.content);
            for pair in entities.windows(2) {
                graph.add_edge(pair[0], pair[1]);
            }
        }
        graph
    }

    fn node_id(&mut self, name: &str) -> usize {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        self.adjacency.push(Vec::new());
        id
    }

    /// Add an undirected edge, creating either node if needed.
    ///
    /// Adding an existing edge is a no-op. `a == b` yields a self-loop.
    pub fn add_edge(&mut self, a: &str, b: &str) {
        let ia = self.node_id(a);
        let ib = self.node_id(b);
        if self.adjacency[ia].contains(&ib) {
            return;
        }
        self.adjacency[ia].push(ib);
        if ia != ib {
            self.adjacency[ib].push(ia);
        }
    }

    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    /// Number of distinct undirected edges (self-loops count once).
    pub fn edge_count(&self) -> usize {
        let loops = self
            .adjacency
            .iter()
            .enumerate()
            .filter(|(i, adj)| adj.contains(i))
            .count();
        let degree_sum: usize = self.adjacency.iter().map(Vec::len).sum();
        (degree_sum - loops) / 2 + loops
    }

    /// Node names in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        match (self.index.get(a), self.index.get(b)) {
            (Some(&ia), Some(&ib)) => self.adjacency[ia].contains(&ib),
            _ => false,
        }
    }

    /// Neighbours of `name`, in insertion order.
    pub fn neighbors(&self, name: &str) -> Vec<&str> {
        self.index
            .get(name)
            .map(|&id| {
                self.adjacency[id]
                    .iter()
                    .map(|&n| self.names[n].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entities related to the query, at most `top_k`.
    ///
    /// Returns an empty vector when no node matches.
    pub fn query(&self, text: &str, top_k: usize) -> Vec<&str> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut related = Vec::new();
        for (id, name) in self.names.iter().enumerate() {
            let name_lower = name.to_lowercase();
            if words.iter().any(|w| name_lower.contains(w)) {
                related.extend(self.adjacency[id].iter().map(|&n| self.names[n].as_str()));
            }
        }
        related.truncate(top_k);
        related
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::make_passage;

    fn graph_of(texts: &[&str]) -> KnowledgeGraph {
        let passages: Vec<Passage> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| make_passage(None, i, t.to_string()))
            .collect();
        KnowledgeGraph::build(&passages)
    }

    #[test]
    fn test_extracts_multiword_entities() {
        assert_eq!(
            extract_entities("We met Ada Lovelace in London with IBM staff."),
            ["We", "Ada Lovelace", "London"]
        );
    }

    #[test]
    fn test_path_edges_only() {
        let g = graph_of(&["Alice met Bob near Carol."]);
        assert!(g.has_edge("Alice", "Bob"));
        assert!(g.has_edge("Bob", "Carol"));
        assert!(!g.has_edge("Alice", "Carol"));
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn test_single_entity_adds_nothing() {
        let g = graph_of(&["only Paris here", "no entities at all"]);
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_edges_are_undirected_and_deduplicated() {
        let g = graph_of(&["Paris and France", "France and Paris", "Paris, France"]);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.neighbors("France"), ["Paris"]);
    }

    #[test]
    fn test_repeated_entity_forms_self_loop() {
        let g = graph_of(&["Rome. Rome again."]);
        assert_eq!(g.neighbors("Rome"), ["Rome"]);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_case_sensitive_nodes() {
        let g = graph_of(&["Paris then Lyon", "paris then Nice Town"]);
        assert!(g.contains_node("Paris"));
        assert!(!g.contains_node("paris"));
    }

    #[test]
    fn test_query_substring_match_returns_neighbors() {
        let g = graph_of(&["Paris is the capital of France.", "Berlin is in Germany."]);
        assert_eq!(g.query("france", 5), ["Paris"]);
        assert_eq!(g.query("What about Germany?", 5), Vec::<&str>::new());
        assert_eq!(g.query("germany", 5), ["Berlin"]);
    }

    #[test]
    fn test_query_keeps_duplicates_and_truncates() {
        // "an" is a substring of both "Anna" and "Dan".
        let g = graph_of(&["Anna knows Carl", "Dan knows Carl", "Carl knows Eve"]);
        let hits = g.query("an", 10);
        assert_eq!(hits, ["Carl", "Carl"]);
        assert_eq!(g.query("an", 1), ["Carl"]);
    }

    #[test]
    fn test_query_no_match_is_empty() {
        let g = graph_of(&["Alice met Bob"]);
        assert!(g.query("zebra", 5).is_empty());
        assert!(g.query("   ", 5).is_empty());
    }

    #[test]
    fn test_deterministic_build() {
        let texts = ["Alice met Bob", "Bob met Carol", "Carol met Alice"];
        let a = graph_of(&texts);
        let b = graph_of(&texts);
        assert_eq!(a.nodes().collect::<Vec<_>>(), b.nodes().collect::<Vec<_>>());
        assert_eq!(a.query("o", 10), b.query("o", 10));
    }
}
