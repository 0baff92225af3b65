//! LLM provider factory.
//!
//! Resolves a provider name from `GenerationSettings` to a client,
//! injecting the endpoint and API key.

use crate::client::LlmClient;
use crate::providers::{gemini::DEFAULT_GEMINI_URL, ollama::DEFAULT_OLLAMA_URL};
use crate::providers::{GeminiClient, OllamaClient};
use std::sync::Arc;
use umrah_core::{AppError, AppResult, GenerationSettings};

/// Create an LLM client from generation settings.
///
/// # Errors
/// Returns `AppError::Llm` if the provider is unknown or a required API key
/// is missing.
pub fn create_client(
    settings: &GenerationSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    match settings.provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = settings.endpoint.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
            Ok(Arc::new(OllamaClient::with_base_url(base_url)))
        }
        "gemini" | "google" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Llm(
                    "Gemini provider requires an API key (GEMINI_API_KEY or GOOGLE_API_KEY)"
                        .to_string(),
                )
            })?;
            let base_url = settings.endpoint.as_deref().unwrap_or(DEFAULT_GEMINI_URL);
            Ok(Arc::new(GeminiClient::with_base_url(base_url, api_key)))
        }
        other => Err(AppError::Llm(format!("Unknown provider: {}", other))),
    }
}
