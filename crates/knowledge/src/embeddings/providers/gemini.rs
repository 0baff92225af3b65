//! Google Gemini embedding provider (`models/{model}:embedContent`).

use super::{check_dimensions, http_client, status_error, transport_error};
use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use umrah_core::{AppError, AppResult};

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiProvider {
    /// # Errors
    /// `AppError::Config` if the HTTP client cannot be built.
    pub fn new(
        base_url: Option<&str>,
        api_key: &str,
        model: &str,
        dimensions: usize,
    ) -> AppResult<Self> {
        Ok(Self {
            client: http_client("Gemini")?,
            base_url: base_url
                .unwrap_or(DEFAULT_GEMINI_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            model: model.trim_start_matches("models/").to_string(),
            dimensions,
        })
    }

    fn request_for<'a>(&self, text: &'a str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: vec![Part { text }],
            },
            output_dimensionality: self.dimensions,
        }
    }

    async fn embed_single(&self, text: &str) -> AppResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(AppError::EmbeddingPermanent(
                "Cannot embed empty text".to_string(),
            ));
        }

        let url = format!("{}/models/{}:embedContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_for(text))
            .send()
            .await
            .map_err(|e| transport_error("Gemini", &e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error("Gemini", status, &error_text));
        }

        let body: EmbedContentResponse = response.json().await.map_err(|e| {
            AppError::EmbeddingPermanent(format!("Failed to parse Gemini response: {}", e))
        })?;

        check_dimensions("Gemini", body.embedding.values.len(), self.dimensions)?;
        Ok(body.embedding.values)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        "gemini"
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
    fn test_model_prefix_normalised() {
        let provider = GeminiProvider::new(None, "key", "models/text-embedding-004", 768).unwrap();
        assert_eq!(provider.model_name(), "text-embedding-004");
    }

    #[test]
    fn test_request_shape() {
        let provider = GeminiProvider::new(None, "key", "text-embedding-004", 256).unwrap();
        let body = serde_json::to_value(provider.request_for("Zamzam water")).unwrap();
        assert_eq!(body["model"], "models/text-embedding-004");
        assert_eq!(body["content"]["parts"][0]["text"], "Zamzam water");
        assert_eq!(body["outputDimensionality"], 256);
    }

    #[test]
    fn test_response_parsing() {
        let body: EmbedContentResponse =
            serde_json::from_str(r#"{"embedding": {"values": [0.1, -0.2, 0.3]}}"#).unwrap();
        assert_eq!(body.embedding.values.len(), 3);
    }
}
