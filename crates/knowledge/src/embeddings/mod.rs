//! Embedding providers.
//!
//! Every provider maps text to a fixed-dimension vector and identifies
//! itself with an [`EmbeddingFingerprint`], which the vector index records
//! so that a snapshot is never queried with a different model.

pub mod provider;
pub mod providers;
pub mod retry;

pub use provider::{create_provider, EmbeddingFingerprint, EmbeddingProvider};
pub use retry::{embed_with_retry, RetryPolicy};
