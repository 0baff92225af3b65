//! Concrete embedding providers.

pub mod gemini;
pub mod mock;
pub mod ollama;

pub use gemini::GeminiProvider;
pub use mock::MockProvider;
pub use ollama::OllamaProvider;

use reqwest::StatusCode;
use umrah_core::AppError;

/// Request timeout for remote embedding APIs, in seconds.
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 30;

pub(crate) fn http_client(provider: &str) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| {
            AppError::Config(format!("Failed to create HTTP client for {}: {}", provider, e))
        })
}

/// Classify a non-success HTTP status: 429 and 5xx are transient.
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> AppError {
    let message = format!("{} API error ({}): {}", provider, status, body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        AppError::EmbeddingTransient(message)
    } else {
        AppError::EmbeddingPermanent(message)
    }
}

/// Classify a transport failure: timeouts and connection problems are transient.
pub(crate) fn transport_error(provider: &str, err: &reqwest::Error) -> AppError {
    let message = format!("Failed to reach {}: {}", provider, err);
    if err.is_timeout() || err.is_connect() || err.is_request() {
        AppError::EmbeddingTransient(message)
    } else {
        AppError::EmbeddingPermanent(message)
    }
}

pub(crate) fn check_dimensions(provider: &str, got: usize, expected: usize) -> Result<(), AppError> {
    if got != expected {
        return Err(AppError::EmbeddingPermanent(format!(
            "{} returned {} dimensions, expected {}",
            provider, got, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(status_error("ollama", StatusCode::TOO_MANY_REQUESTS, "slow down").is_transient());
        assert!(status_error("ollama", StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(status_error("ollama", StatusCode::INTERNAL_SERVER_ERROR, "").is_transient());
        assert!(!status_error("ollama", StatusCode::BAD_REQUEST, "bad input").is_transient());
        assert!(matches!(
            status_error("gemini", StatusCode::NOT_FOUND, "model not found"),
            AppError::EmbeddingPermanent(_)
        ));
    }

    #[test]
    fn test_dimension_check() {
        assert!(check_dimensions("ollama", 768, 768).is_ok());
        assert!(matches!(
            check_dimensions("ollama", 384, 768),
            Err(AppError::EmbeddingPermanent(_))
        ));
    }
}
