//! Ollama embedding provider.
//!
//! Local semantic embeddings via Ollama's `/api/embeddings` endpoint, using
//! models such as `nomic-embed-text` (768 dimensions). The endpoint takes one
//! prompt per request, so batches are embedded sequentially; the ingestion
//! pipeline fans batches out concurrently.

use super::{check_dimensions, http_client, status_error, transport_error};
use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use umrah_core::{AppError, AppResult};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// # Errors
    /// `AppError::Config` if the HTTP client cannot be built.
    pub fn new(base_url: Option<&str>, model: &str, dimensions: usize) -> AppResult<Self> {
        Ok(Self {
            client: http_client("Ollama")?,
            base_url: base_url
                .unwrap_or(DEFAULT_OLLAMA_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            dimensions,
        })
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed_single(&self, text: &str) -> AppResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(AppError::EmbeddingPermanent(
                "Cannot embed empty text".to_string(),
            ));
        }

        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("Ollama", &e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);
            return Err(status_error("Ollama", status, &message));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::EmbeddingPermanent(format!("Failed to parse Ollama response: {}", e))
        })?;

        check_dimensions("Ollama", body.embedding.len(), self.dimensions)?;

        debug!("Generated {} dimensional embedding", body.embedding.len());
        Ok(body.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_single(text).await?);
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let provider = OllamaProvider::new(Some("http://gpu-box:11434/"), "nomic-embed-text", 768)
            .unwrap();
        assert_eq!(provider.base_url, "http://gpu-box:11434");
        assert_eq!(provider.dimensions(), 768);
    }

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(EmbeddingRequest {
            model: "nomic-embed-text",
            prompt: "Sa'i between Safa and Marwa",
        })
        .unwrap();
        assert_eq!(body["model"], "nomic-embed-text");
        assert_eq!(body["prompt"], "Sa'i between Safa and Marwa");
    }

    #[tokio::test]
    async fn test_empty_text_is_permanent() {
        let provider = OllamaProvider::new(None, "nomic-embed-text", 768).unwrap();
        let result = provider.embed("   ").await;
        assert!(matches!(result, Err(AppError::EmbeddingPermanent(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        // Port 9 (discard) is closed on test machines; the connection is refused.
        let provider = OllamaProvider::new(Some("http://127.0.0.1:9"), "nomic-embed-text", 768)
            .unwrap();
        let err = provider.embed("Ihram").await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {}", err);
    }
}
