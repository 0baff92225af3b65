//! Retrieval-augmented query engine for Umrah travel questions.
//!
//! Ingestion: source records -> [`normalize`] -> [`chunker`] ->
//! [`embeddings`] -> [`vector_index`], persisted by [`index`].
//!
//! Query: [`router`] -> [`vector_index`] search -> [`rag`] synthesis.
//!
//! [`engine::RagEngine`] ties both together and owns the index.

pub mod chunker;
pub mod document;
pub mod embeddings;
pub mod engine;
pub mod index;
pub mod normalize;
pub mod rag;
pub mod records;
pub mod router;
pub mod vector_index;

pub use chunker::{Chunk, ChunkConfig, Chunker};
pub use document::{DocType, Document, MetaValue, Metadata};
pub use embeddings::{create_provider, EmbeddingFingerprint, EmbeddingProvider};
pub use engine::{EngineSettings, EngineState, IndexOrigin, IngestReport, RagEngine};
pub use normalize::{normalize, normalize_batch, NormalizeReport};
pub use rag::{RagAnswer, SourceRef};
pub use records::{JsonFileSource, MalformedRecord, RecordBatch, RecordSource, SourceRecord};
pub use router::{classify, plan, Intent, RetrievalPlan};
pub use vector_index::{IndexStats, MetadataFilter, SearchHit, VectorIndex};
