//! Bounded retry with exponential backoff for transient embedding failures.

use super::EmbeddingProvider;
use std::time::Duration;
use tracing::warn;
use umrah_core::{AppError, AppResult, EmbeddingSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        Self {
            max_attempts: settings.max_retries.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Embed `texts`, retrying transient failures. Permanent failures return at once.
///
/// # Errors
/// The last transient error once attempts are exhausted, or the first
/// permanent error. A provider returning the wrong number of vectors is a
/// permanent error.
pub async fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    policy: &RetryPolicy,
) -> AppResult<Vec<Vec<f32>>> {
    let mut attempt = 1;
    loop {
        match provider.embed_batch(texts).await {
            Ok(vectors) if vectors.len() == texts.len() => return Ok(vectors),
            Ok(vectors) => {
                return Err(AppError::EmbeddingPermanent(format!(
                    "{} returned {} vectors for {} texts",
                    provider.provider_name(),
                    vectors.len(),
                    texts.len()
                )))
            }
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let backoff = policy.backoff(attempt);
                warn!(
                    "Embedding failed (attempt {}/{}), retrying in {}ms: {}",
                    attempt,
                    policy.max_attempts,
                    backoff.as_millis(),
                    e
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
