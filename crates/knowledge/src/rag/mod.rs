//! Retrieval-augmented answering: prompt assembly, model call, citations.

pub mod ask;
pub mod types;

pub use ask::Synthesizer;
pub use types::{RagAnswer, SourceRef};
