use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

/// A single coping-technique text loaded from the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct IndexedDocument {
    doc: Document,
    tokens: HashSet<String>,
}

/// Read-only keyword-overlap index over a small directory of `*.txt` files.
#[derive(Debug, Clone, Default)]
pub struct TechniqueIndex {
    docs: Vec<IndexedDocument>,
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(ToOwned::to_owned)
        .collect()
}

impl TechniqueIndex {
    pub fn from_documents(documents: Vec<Document>) -> Self {
        let docs = documents
            .into_iter()
            .map(|doc| IndexedDocument {
                tokens: tokenize(&doc.text),
                doc,
            })
            .collect();
        Self { docs }
    }

    /// Load every `*.txt` file in `dir`, ordered by file name.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            tracing::warn!("technique corpus not found: {}", dir.display());
            return Ok(Self::default());
        }

        let mut documents = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("failed to list technique corpus: {}", dir.display()))?
        {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(text) => documents.push(Document::new(name, text.trim())),
                Err(e) => {
                    tracing::warn!("Failed to load technique from {}: {e}", path.display());
                }
            }
        }
        documents.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::info!(count = documents.len(), dir = %dir.display(), "technique corpus loaded");
        Ok(Self::from_documents(documents))
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.docs.iter().map(|d| &d.doc)
    }

    /// Texts of the best-matching documents, most relevant first.
    ///
    /// Never returns an empty list: with no overlapping document the first
    /// loaded document is returned, and an empty corpus yields `[""]`.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Vec<String> {
        let query_tokens = tokenize(query);

        let mut scored: Vec<(usize, &Document)> = self
            .docs
            .iter()
            .map(|d| (d.tokens.intersection(&query_tokens).count(), &d.doc))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        if scored.is_empty() {
            let fallback = self
                .docs
                .first()
                .map(|d| d.doc.text.clone())
                .unwrap_or_default();
            return vec![fallback];
        }

        scored
            .into_iter()
            .take(top_k)
            .map(|(_, doc)| doc.text.clone())
            .collect()
    }
}
