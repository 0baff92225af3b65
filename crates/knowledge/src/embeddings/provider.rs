//! Embedding provider trait and factory.

use super::providers::{GeminiProvider, MockProvider, OllamaProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use umrah_core::{AppError, AppResult, EmbeddingSettings};

/// Identity of the embedding space an index was built in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingFingerprint {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

impl fmt::Display for EmbeddingFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}d)", self.provider, self.model, self.dimensions)
    }
}

/// Trait for embedding providers.
///
/// Failures are reported as `AppError::EmbeddingTransient` (worth retrying)
/// or `AppError::EmbeddingPermanent`.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "ollama", "gemini")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch, in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::EmbeddingPermanent("No embedding returned".to_string()))
    }

    fn fingerprint(&self) -> EmbeddingFingerprint {
        EmbeddingFingerprint {
            provider: self.provider_name().to_string(),
            model: self.model_name().to_string(),
            dimensions: self.dimensions(),
        }
    }
}

/// Create an embedding provider from settings.
///
/// # Errors
/// `AppError::Config` for an unknown provider or a missing Gemini key.
pub fn create_provider(
    settings: &EmbeddingSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match settings.provider.to_lowercase().as_str() {
        "mock" => Ok(Arc::new(MockProvider::new(settings.dimensions))),

        "ollama" => Ok(Arc::new(OllamaProvider::new(
            settings.endpoint.as_deref(),
            &settings.model,
            settings.dimensions,
        )?)),

        "gemini" | "google" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config(
                    "Gemini embeddings require an API key (GEMINI_API_KEY or GOOGLE_API_KEY)"
                        .to_string(),
                )
            })?;
            Ok(Arc::new(GeminiProvider::new(
                settings.endpoint.as_deref(),
                api_key,
                &settings.model,
                settings.dimensions,
            )?))
        }

        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: mock, ollama, gemini",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str) -> EmbeddingSettings {
        EmbeddingSettings {
            provider: provider.to_string(),
            dimensions: 64,
            ..EmbeddingSettings::default()
        }
    }

    #[test]
    fn test_create_mock_provider() {
        let provider = create_provider(&settings("mock"), None).unwrap();
        assert_eq!(
            provider.fingerprint(),
            EmbeddingFingerprint {
                provider: "mock".to_string(),
                model: "trigram-v1".to_string(),
                dimensions: 64,
            }
        );
    }

    #[test]
    fn test_create_ollama_provider() {
        let provider = create_provider(&settings("ollama"), None).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
    }

    #[test]
    fn test_gemini_requires_key() {
        let result = create_provider(&settings("gemini"), None);
        assert!(matches!(result, Err(AppError::Config(_))));
        assert!(create_provider(&settings("gemini"), Some("k")).is_ok());
    }

    #[test]
    fn test_create_unknown_provider() {
        let err = create_provider(&settings("word2vec"), None).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_fingerprint_display() {
        let fp = EmbeddingFingerprint {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
        };
        assert_eq!(fp.to_string(), "ollama/nomic-embed-text (768d)");
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let provider = create_provider(&settings("mock"), None).unwrap();
        let embedding = provider.embed("Tawaf around the Kaaba").await.unwrap();
        assert_eq!(embedding.len(), 64);
    }
}
