//! Engine lifecycle: restore or build the index once, then answer questions.
//!
//! The index lives in a [`tokio::sync::OnceCell`]. Concurrent first calls to
//! [`RagEngine::ask`] share a single initialisation; a failed initialisation
//! leaves the cell empty so the next call tries again. Once loaded the index
//! is read-only. [`RagEngine::rebuild`] writes a fresh snapshot without
//! touching the index a running engine is serving from.

use crate::chunker::{Chunk, ChunkConfig, Chunker};
use crate::embeddings::{embed_with_retry, EmbeddingFingerprint, EmbeddingProvider, RetryPolicy};
use crate::normalize::normalize_batch;
use crate::rag::{RagAnswer, Synthesizer};
use crate::records::RecordSource;
use crate::router;
use crate::vector_index::{EmbeddedChunk, VectorIndex};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use umrah_core::{
    AppConfig, AppError, AppResult, EmbeddingSettings, GenerationSettings, RetrievalSettings,
};
use umrah_llm::LlmClient;
use umrah_prompt::PromptLibrary;

/// Everything the engine needs from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub index_path: PathBuf,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            index_path: config.index_file(),
            embedding: config.embedding.clone(),
            generation: config.generation.clone(),
            retrieval: config.retrieval.clone(),
        }
    }
}

/// Counts from one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub records_received: usize,
    pub documents: usize,
    /// Records that failed normalisation.
    pub rejected: usize,
    pub chunks: usize,
    pub embedded: usize,
    /// Chunks skipped after a permanent embedding error.
    pub embedding_failures: usize,
}

/// Where the serving index came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexOrigin {
    Restored,
    Built(IngestReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineState {
    pub origin: IndexOrigin,
    pub chunk_count: usize,
    pub fingerprint: EmbeddingFingerprint,
}

struct Loaded {
    index: VectorIndex,
    origin: IndexOrigin,
}

impl Loaded {
    fn state(&self) -> EngineState {
        EngineState {
            origin: self.origin.clone(),
            chunk_count: self.index.len(),
            fingerprint: self.index.fingerprint().clone(),
        }
    }
}

/// The query engine. Build one per process and share it.
pub struct RagEngine {
    settings: EngineSettings,
    embedder: Arc<dyn EmbeddingProvider>,
    source: Arc<dyn RecordSource>,
    synthesizer: Synthesizer,
    loaded: OnceCell<Loaded>,
}

impl RagEngine {
    pub fn new(
        settings: EngineSettings,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        source: Arc<dyn RecordSource>,
    ) -> Self {
        let synthesizer =
            Synthesizer::new(llm, prompts, settings.generation.clone(), &settings.retrieval);
        Self {
            settings,
            embedder,
            source,
            synthesizer,
            loaded: OnceCell::new(),
        }
    }

    /// Whether the index has been loaded.
    pub fn is_initialized(&self) -> bool {
        self.loaded.initialized()
    }

    /// Restore the index, or build and persist it on first run.
    ///
    /// # Errors
    /// `AppError::IndexCorrupt` for a damaged snapshot,
    /// `AppError::EmbeddingModelMismatch` when the snapshot was built with a
    /// different embedder, and any ingestion error.
    pub async fn initialize(&self) -> AppResult<EngineState> {
        Ok(self.loaded().await?.state())
    }

    async fn loaded(&self) -> AppResult<&Loaded> {
        self.loaded.get_or_try_init(|| self.restore_or_build()).await
    }

    /// Answer one question.
    pub async fn ask(&self, question: &str) -> AppResult<RagAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Knowledge("Question is empty".to_string()));
        }

        let loaded = self.loaded().await?;
        let plan = router::plan(question);
        let filter = (!plan.filter.is_empty()).then_some(&plan.filter);

        tracing::info!(intent = %plan.intent, filter = %plan.filter, "Routing question");

        let hits = loaded
            .index
            .search(
                self.embedder.as_ref(),
                question,
                self.settings.retrieval.top_k,
                filter,
                &RetryPolicy::from_settings(&self.settings.embedding),
            )
            .await?;

        tracing::debug!(
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score).unwrap_or(0.0),
            "Search complete"
        );

        self.synthesizer.synthesize(question, &plan, &hits).await
    }

    /// Ingest from scratch and replace the snapshot on disk.
    ///
    /// An already-loaded index keeps serving; the new snapshot is picked up
    /// by the next process.
    pub async fn rebuild(&self) -> AppResult<IngestReport> {
        let (index, report) = self.build_index().await?;
        index.persist(&self.settings.index_path)?;
        Ok(report)
    }

    async fn restore_or_build(&self) -> AppResult<Loaded> {
        let path = &self.settings.index_path;
        match VectorIndex::restore(path) {
            Ok(index) => {
                index.ensure_compatible(&self.embedder.fingerprint())?;
                tracing::info!(
                    path = %path.display(),
                    chunks = index.len(),
                    "Restored index"
                );
                Ok(Loaded {
                    index,
                    origin: IndexOrigin::Restored,
                })
            }
            Err(e) if e.is_index_not_found() => {
                tracing::info!(path = %path.display(), "No index snapshot, building");
                let (index, report) = self.build_index().await?;
                index.persist(path)?;
                Ok(Loaded {
                    index,
                    origin: IndexOrigin::Built(report),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn build_index(&self) -> AppResult<(VectorIndex, IngestReport)> {
        let start = Instant::now();
        tracing::info!(source = %self.source.describe(), "Starting ingestion");

        let batch = self.source.load().await?;
        let (documents, normalized) = normalize_batch(batch.into_records());

        let chunker = Chunker::new(ChunkConfig::from(&self.settings.retrieval))?;
        let chunks: Vec<Chunk> = documents.iter().flat_map(|doc| chunker.chunks(doc)).collect();

        let mut report = IngestReport {
            records_received: normalized.received,
            documents: normalized.accepted,
            rejected: normalized.rejected,
            chunks: chunks.len(),
            ..IngestReport::default()
        };

        let embedder = self.embedder.as_ref();
        let policy = RetryPolicy::from_settings(&self.settings.embedding);
        let batch_size = self.settings.embedding.batch_size.max(1);
        let concurrency = self.settings.embedding.concurrency.max(1);

        let mut index = VectorIndex::new(embedder.fingerprint());
        let mut batches = std::pin::pin!(stream::iter(chunks.chunks(batch_size))
            .map(|group| async move {
                let texts: Vec<String> = group.iter().map(|c| c.text.clone()).collect();
                let result = embed_with_retry(embedder, &texts, &policy).await;
                (group, result)
            })
            .buffered(concurrency));

        // Batches arrive in chunk order; inserts are serial.
        while let Some((group, result)) = batches.next().await {
            let vectors: Vec<Option<Vec<f32>>> = match result {
                Ok(vectors) => vectors.into_iter().map(Some).collect(),
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => {
                    tracing::warn!("Batch embedding failed, embedding chunks one by one: {}", e);
                    embed_individually(embedder, group, &policy).await?
                }
            };

            let embedded: Vec<EmbeddedChunk> = group
                .iter()
                .zip(vectors)
                .filter_map(|(chunk, vector)| {
                    vector.map(|v| EmbeddedChunk::new(chunk.clone(), v))
                })
                .collect();

            report.embedding_failures += group.len() - embedded.len();
            report.embedded += index.insert(embedded)?;
        }

        tracing::info!(
            records = report.records_received,
            rejected = report.rejected,
            chunks = report.chunks,
            embedded = report.embedded,
            embedding_failures = report.embedding_failures,
            "Ingestion completed in {:.2}s",
            start.elapsed().as_secs_f64()
        );

        Ok((index, report))
    }
}

/// Embed each chunk alone so one bad input does not sink its batch.
/// `None` marks a chunk rejected permanently; transient errors still abort.
async fn embed_individually(
    embedder: &dyn EmbeddingProvider,
    group: &[Chunk],
    policy: &RetryPolicy,
) -> AppResult<Vec<Option<Vec<f32>>>> {
    let mut vectors = Vec::with_capacity(group.len());
    for chunk in group {
        match embed_with_retry(embedder, std::slice::from_ref(&chunk.text), policy).await {
            Ok(mut single) => vectors.push(single.pop()),
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => {
                tracing::warn!(position = chunk.position, "Skipping chunk: {}", e);
                vectors.push(None);
            }
        }
    }
    Ok(vectors)
}
