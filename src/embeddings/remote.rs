//! Ollama embeddings client
//!
//! Calls `POST /api/embeddings` on a local Ollama server. Connection errors,
//! timeouts and 429/5xx responses are retried with exponential backoff;
//! anything else fails immediately.

use crate::embeddings::{EmbeddingConfig, EmbeddingService};
use crate::error::{MotivateError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Maximum retry attempts
const MAX_RETRIES: usize = 3;

/// Backoff base duration in milliseconds
const BACKOFF_BASE_MS: u64 = 500;

pub struct OllamaEmbedder {
    client: Client,
    model: String,
    base_url: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

enum CallFailure {
    Retryable(MotivateError),
    Fatal(MotivateError),
}

impl OllamaEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(MotivateError::ValidationError(
                "embedding base_url cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| MotivateError::CollaboratorUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            model: config.model,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            dimensions: config.dimensions,
        })
    }

    async fn call_api_with_retry(&self, text: &str) -> Result<Vec<f32>> {
        let mut retries = 0;

        loop {
            match self.call_api(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(CallFailure::Fatal(e)) => return Err(e),
                Err(CallFailure::Retryable(e)) => {
                    if retries >= MAX_RETRIES {
                        return Err(e);
                    }

                    let backoff_ms = BACKOFF_BASE_MS * 2_u64.pow(retries as u32);
                    warn!(
                        "Embedding call failed ({}), retrying after {}ms (attempt {}/{})",
                        e,
                        backoff_ms,
                        retries + 1,
                        MAX_RETRIES
                    );

                    sleep(Duration::from_millis(backoff_ms)).await;
                    retries += 1;
                }
            }
        }
    }

    async fn call_api(&self, text: &str) -> std::result::Result<Vec<f32>, CallFailure> {
        debug!("Calling Ollama embeddings, model: {}", self.model);

        let request = EmbeddingsRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let err = MotivateError::CollaboratorUnavailable(format!("embedder: {}", e));
                if e.is_connect() {
                    // nothing is listening; retrying will not help
                    CallFailure::Fatal(err)
                } else {
                    CallFailure::Retryable(err)
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let body = response.json::<EmbeddingsResponse>().await.map_err(|e| {
                    CallFailure::Fatal(MotivateError::CollaboratorUnavailable(format!(
                        "failed to parse embedder response: {}",
                        e
                    )))
                })?;
                Ok(body.embedding)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(CallFailure::Retryable(
                MotivateError::CollaboratorUnavailable("embedder rate limited".to_string()),
            )),
            s if s.is_server_error() => {
                let error_text = response.text().await.unwrap_or_default();
                Err(CallFailure::Retryable(MotivateError::CollaboratorUnavailable(
                    format!("embedder returned status {}: {}", s, error_text),
                )))
            }
            _ => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(CallFailure::Fatal(MotivateError::CollaboratorUnavailable(
                    format!("embedder returned status {}: {}", status, error_text),
                )))
            }
        }
    }

    fn validate_embedding(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(MotivateError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }

        if embedding.iter().any(|&x| !x.is_finite()) {
            return Err(MotivateError::CollaboratorUnavailable(
                "embedding contains invalid values (NaN or Inf)".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl EmbeddingService for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(MotivateError::ValidationError(
                "Text cannot be empty".to_string(),
            ));
        }

        let embedding = self.call_api_with_retry(text).await?;
        self.validate_embedding(&embedding)?;
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingProvider;

    fn config(base_url: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: EmbeddingProvider::Ollama,
            model: "nomic-embed-text".to_string(),
            dimensions: 8,
            base_url: base_url.to_string(),
            request_timeout_secs: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_service_creation() {
        let service = OllamaEmbedder::new(config("http://localhost:11434/")).unwrap();
        assert_eq!(service.dimensions(), 8);
        assert_eq!(service.model_name(), "nomic-embed-text");
        assert_eq!(service.base_url, "http://localhost:11434");

        assert!(OllamaEmbedder::new(config("")).is_err());
    }

    #[test]
    fn test_validate_embedding() {
        let service = OllamaEmbedder::new(config("http://localhost:11434")).unwrap();

        assert!(service.validate_embedding(&[0.5; 8]).is_ok());
        assert!(matches!(
            service.validate_embedding(&[0.5; 4]),
            Err(MotivateError::DimensionMismatch {
                expected: 8,
                actual: 4
            })
        ));

        let mut nan = vec![0.5; 8];
        nan[0] = f32::NAN;
        assert!(service.validate_embedding(&nan).is_err());

        let mut inf = vec![0.5; 8];
        inf[3] = f32::INFINITY;
        assert!(service.validate_embedding(&inf).is_err());
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let service = OllamaEmbedder::new(config("http://localhost:11434")).unwrap();
        assert!(matches!(
            service.embed("  ").await,
            Err(MotivateError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_fast() {
        let service = OllamaEmbedder::new(config("http://127.0.0.1:9")).unwrap();
        let err = service.embed("hello").await.unwrap_err();
        assert!(matches!(err, MotivateError::CollaboratorUnavailable(_)));
    }
}
