//! Document search backends.
//!
//! [`KeywordStore`] keeps paragraph-sized chunks of a documentation tree in
//! memory, ranks them by term overlap with the query and optionally
//! diversifies the top candidates with maximal marginal relevance.

use docassist_core::error::ToolError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Target size of a chunk when merging short paragraphs.
const CHUNK_CHARS: usize = 1_200;

/// Relevance/diversity trade-off for MMR selection.
const MMR_LAMBDA: f32 = 0.5;

/// A retrievable piece of documentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Where the text came from (file path relative to the docs root)
    pub source: String,
    pub content: String,
}

impl Document {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
        }
    }
}

/// How candidates are picked from the ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Top `k` by relevance.
    Similarity,
    /// `k` picks from the top `fetch_k`, penalising redundancy.
    Mmr,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Similarity => "similarity",
            SearchType::Mmr => "mmr",
        }
    }
}

impl std::str::FromStr for SearchType {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "similarity" => Ok(SearchType::Similarity),
            "mmr" => Ok(SearchType::Mmr),
            other => Err(ToolError::InvalidArguments(format!("unknown search type '{other}'"))),
        }
    }
}

/// Search parameters. These are also part of the retrieval cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub k: usize,
    pub fetch_k: usize,
    pub search_type: SearchType,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            k: 5,
            fetch_k: 20,
            search_type: SearchType::Mmr,
        }
    }
}

/// A backend able to answer documentation queries.
pub trait DocumentSearch: Send + Sync {
    fn search(&self, query: &str, params: &SearchParams) -> Result<Vec<Document>, ToolError>;
}

struct Chunk {
    doc: Document,
    terms: HashMap<String, usize>,
    term_count: usize,
}

impl Chunk {
    fn new(doc: Document) -> Self {
        let mut terms = HashMap::new();
        let mut term_count = 0;
        for term in tokenize(&doc.content) {
            *terms.entry(term).or_insert(0) += 1;
            term_count += 1;
        }
        Self {
            doc,
            terms,
            term_count,
        }
    }

    fn relevance(&self, query_terms: &HashSet<String>) -> f32 {
        if self.term_count == 0 {
            return 0.0;
        }
        let hits: usize = query_terms
            .iter()
            .filter_map(|t| self.terms.get(t))
            .sum();
        let covered = query_terms.iter().filter(|t| self.terms.contains_key(*t)).count();
        // Coverage dominates; frequency breaks ties, damped by length
        covered as f32 + hits as f32 / (self.term_count as f32).sqrt()
    }

    fn similarity(&self, other: &Chunk) -> f32 {
        let shared = self.terms.keys().filter(|t| other.terms.contains_key(*t)).count();
        let union = self.terms.len() + other.terms.len() - shared;
        if union == 0 { 0.0 } else { shared as f32 / union as f32 }
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .map(str::to_lowercase)
}

/// In-memory keyword-scored document store.
#[derive(Default)]
pub struct KeywordStore {
    chunks: Vec<Chunk>,
}

impl KeywordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(docs: impl IntoIterator<Item = Document>) -> Self {
        let mut store = Self::new();
        for doc in docs {
            store.add(doc);
        }
        store
    }

    pub fn add(&mut self, doc: Document) {
        self.chunks.push(Chunk::new(doc));
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Index every `.md` / `.txt` file under `dir`, split into paragraph chunks.
    pub fn load_dir(dir: &Path) -> Result<Self, ToolError> {
        let mut store = Self::new();
        let mut files = Vec::new();
        collect_files(dir, &mut files)?;
        files.sort();

        for path in files {
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable document");
                    continue;
                }
            };
            let source = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            for content in split_paragraphs(&text, CHUNK_CHARS) {
                store.add(Document::new(source.clone(), content));
            }
        }

        info!(dir = %dir.display(), chunks = store.len(), "Indexed documentation");
        Ok(store)
    }

    fn mmr(&self, ranked: &[(usize, f32)], k: usize) -> Vec<usize> {
        let top = ranked.first().map(|(_, s)| *s).unwrap_or(1.0).max(f32::EPSILON);
        let mut candidates: Vec<(usize, f32)> = ranked.iter().map(|&(i, s)| (i, s / top)).collect();
        let mut selected: Vec<usize> = Vec::with_capacity(k);

        while selected.len() < k && !candidates.is_empty() {
            let mut best_pos = 0;
            let mut best_score = f32::NEG_INFINITY;
            for (pos, &(idx, rel)) in candidates.iter().enumerate() {
                let redundancy = selected
                    .iter()
                    .map(|&s| self.chunks[idx].similarity(&self.chunks[s]))
                    .fold(0.0, f32::max);
                let score = MMR_LAMBDA * rel - (1.0 - MMR_LAMBDA) * redundancy;
                if score > best_score {
                    best_score = score;
                    best_pos = pos;
                }
            }
            selected.push(candidates.remove(best_pos).0);
        }

        selected
    }
}

impl DocumentSearch for KeywordStore {
    fn search(&self, query: &str, params: &SearchParams) -> Result<Vec<Document>, ToolError> {
        let query_terms: HashSet<String> = tokenize(query).collect();
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut ranked: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (i, c.relevance(&query_terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let picked: Vec<usize> = match params.search_type {
            SearchType::Similarity => ranked.iter().take(params.k).map(|(i, _)| *i).collect(),
            SearchType::Mmr => {
                ranked.truncate(params.fetch_k.max(params.k));
                self.mmr(&ranked, params.k)
            }
        };

        debug!(query, candidates = ranked.len(), returned = picked.len(), "Document search");
        Ok(picked.into_iter().map(|i| self.chunks[i].doc.clone()).collect())
    }
}

fn collect_files(dir: &Path, out: &mut Vec<std::path::PathBuf>) -> Result<(), ToolError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ToolError::ExecutionFailed {
        tool_name: "retriever".into(),
        reason: format!("cannot read docs directory {}: {e}", dir.display()),
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md") | Some("markdown") | Some("txt")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

/// Split on blank lines, merging consecutive paragraphs up to `target` chars.
fn split_paragraphs(text: &str, target: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty() && current.chars().count() + para.chars().count() > target {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
