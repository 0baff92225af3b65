//! Exact cosine-similarity index over embedded chunks.

use crate::chunker::Chunk;
use crate::document::{MetaValue, Metadata, TYPE_KEY};
use crate::embeddings::{embed_with_retry, EmbeddingFingerprint, EmbeddingProvider, RetryPolicy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use umrah_core::{AppError, AppResult};

/// A chunk together with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub text: String,
    pub metadata: Metadata,
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            text: chunk.text,
            metadata: chunk.metadata,
            vector,
        }
    }
}

/// Exact-match conjunction over metadata keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataFilter {
    clauses: BTreeMap<String, MetaValue>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `key = value` clause.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.clauses.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.clauses.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.clauses
            .iter()
            .all(|(key, value)| metadata.get(key) == Some(value))
    }
}

impl fmt::Display for MetadataFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return f.write_str("(none)");
        }
        let clauses: Vec<String> = self
            .clauses
            .iter()
            .map(|(k, v)| format!("{} = {}", k, v))
            .collect();
        f.write_str(&clauses.join(" AND "))
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
    /// Insertion order within the index.
    pub seq: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub chunk_count: usize,
    pub by_type: BTreeMap<String, usize>,
    pub fingerprint: EmbeddingFingerprint,
}

/// Flat vector index, tied to the embedding space it was built in.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    fingerprint: EmbeddingFingerprint,
    chunks: Vec<EmbeddedChunk>,
}

impl VectorIndex {
    pub fn new(fingerprint: EmbeddingFingerprint) -> Self {
        Self {
            fingerprint,
            chunks: Vec::new(),
        }
    }

    pub(crate) fn from_parts(fingerprint: EmbeddingFingerprint, chunks: Vec<EmbeddedChunk>) -> Self {
        Self {
            fingerprint,
            chunks,
        }
    }

    pub fn fingerprint(&self) -> &EmbeddingFingerprint {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub(crate) fn chunks(&self) -> &[EmbeddedChunk] {
        &self.chunks
    }

    /// Append chunks in order. Duplicates are kept.
    ///
    /// # Errors
    /// `AppError::Knowledge` if any vector has the wrong dimension; nothing is
    /// inserted in that case.
    pub fn insert(&mut self, chunks: Vec<EmbeddedChunk>) -> AppResult<usize> {
        let dims = self.fingerprint.dimensions;
        if let Some(bad) = chunks.iter().find(|c| c.vector.len() != dims) {
            return Err(AppError::Knowledge(format!(
                "Cannot insert {}-dimensional vector into {}-dimensional index",
                bad.vector.len(),
                dims
            )));
        }

        let count = chunks.len();
        self.chunks.extend(chunks);
        Ok(count)
    }

    /// Fail unless `fingerprint` is the embedding space this index was built in.
    pub fn ensure_compatible(&self, fingerprint: &EmbeddingFingerprint) -> AppResult<()> {
        if &self.fingerprint != fingerprint {
            return Err(AppError::EmbeddingModelMismatch {
                expected: self.fingerprint.to_string(),
                actual: fingerprint.to_string(),
            });
        }
        Ok(())
    }

    /// Embed `query` with `embedder` and return the `k` nearest chunks.
    /// Transient embedding failures are retried under `policy`.
    ///
    /// # Errors
    /// `AppError::EmbeddingModelMismatch` if `embedder` is not the provider
    /// the index was built with; embedding errors that outlast the retries
    /// are propagated.
    pub async fn search(
        &self,
        embedder: &dyn EmbeddingProvider,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
        policy: &RetryPolicy,
    ) -> AppResult<Vec<SearchHit>> {
        self.ensure_compatible(&embedder.fingerprint())?;
        let query_vector = embed_with_retry(embedder, &[query.to_string()], policy)
            .await?
            .pop()
            .ok_or_else(|| {
                AppError::EmbeddingPermanent("No query embedding returned".to_string())
            })?;
        self.search_by_vector(&query_vector, k, filter)
    }

    /// Nearest chunks by cosine similarity, descending; ties keep insertion order.
    /// A filter that matches nothing yields an empty result.
    pub fn search_by_vector(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<SearchHit>> {
        if query.len() != self.fingerprint.dimensions {
            return Err(AppError::Knowledge(format!(
                "Query vector has {} dimensions, index has {}",
                query.len(),
                self.fingerprint.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| filter.map_or(true, |f| f.matches(&c.metadata)))
            .map(|(seq, c)| (seq, cosine_similarity(query, &c.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(seq, score)| {
                let chunk = &self.chunks[seq];
                SearchHit {
                    text: chunk.text.clone(),
                    metadata: chunk.metadata.clone(),
                    score,
                    seq,
                }
            })
            .collect())
    }

    pub fn stats(&self) -> IndexStats {
        let mut by_type = BTreeMap::new();
        for chunk in &self.chunks {
            let doc_type = chunk
                .metadata
                .get(TYPE_KEY)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            *by_type.entry(doc_type).or_insert(0) += 1;
        }

        IndexStats {
            chunk_count: self.chunks.len(),
            by_type,
            fingerprint: self.fingerprint.clone(),
        }
    }
}

/// Calculate cosine similarity between two vectors.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
