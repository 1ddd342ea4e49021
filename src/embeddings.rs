use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::RagConfig;
use crate::error::RagError;

/// Maps text to fixed-dimension semantic vectors. Same text plus same
/// model configuration must produce the same vector (up to any provider
/// numeric noise, which retrieval ranking tolerates).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a batch, one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Embeds a single query string.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}

const QUERY_CACHE_SIZE: usize = 1000;

/// Embedding client for OpenAI-compatible `/embeddings` endpoints, with
/// an LRU cache for query embeddings and bounded retry on transient
/// failures (429/5xx/timeouts). Non-transient 4xx failures such as a
/// bad credential propagate immediately.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_retries: usize,
    query_cache: RwLock<LruCache<String, Vec<f32>>>,
}

impl OpenAiEmbedder {
    pub fn new(config: &RagConfig) -> Result<Self, RagError> {
        if config.api_key.trim().is_empty() {
            return Err(RagError::Configuration(
                "API key must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(model = %config.embedding_model, "Embedding client configured");

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.api_base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.embedding_model.clone(),
            max_retries: config.max_retries,
            query_cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_SIZE).expect("cache size is non-zero"),
            )),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut attempt = 0usize;
        loop {
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = resp.json().await.map_err(|e| {
                            RagError::EmbeddingService(format!(
                                "failed to parse embedding response: {e}"
                            ))
                        })?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        if parsed.data.len() != texts.len() {
                            return Err(RagError::EmbeddingService(format!(
                                "service returned {} embeddings for {} inputs",
                                parsed.data.len(),
                                texts.len()
                            )));
                        }
                        return Ok(parsed
                            .data
                            .into_iter()
                            .map(|entry| entry.embedding)
                            .collect());
                    }

                    let body = resp.text().await.unwrap_or_default();
                    if is_transient_status(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        let backoff = retry_backoff(attempt);
                        tracing::warn!(
                            %status,
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            "Transient embedding failure, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    return Err(RagError::EmbeddingService(format!(
                        "embedding request failed ({status}): {body}"
                    )));
                }
                Err(err) => {
                    if is_transient_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        let backoff = retry_backoff(attempt);
                        tracing::warn!(
                            error = %err,
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            "Embedding request error, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    return Err(RagError::EmbeddingService(format!(
                        "embedding request failed: {err}"
                    )));
                }
            }
        }
    }
}

fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn retry_backoff(attempt: usize) -> Duration {
    Duration::from_millis(500u64.saturating_mul(1 << attempt.min(6)))
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_embeddings(texts).await
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        if let Some(cached) = self.query_cache.write().await.get(text) {
            tracing::debug!("Query embedding served from cache");
            return Ok(cached.clone());
        }

        let mut vectors = self.request_embeddings(&[text.to_string()]).await?;
        let embedding = vectors.pop().ok_or_else(|| {
            RagError::EmbeddingService("service returned no embedding".to_string())
        })?;

        self.query_cache
            .write()
            .await
            .put(text.to_string(), embedding.clone());
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_api_key_is_configuration_error() {
        let config = RagConfig {
            api_key: "   ".to_string(),
            ..RagConfig::default()
        };
        assert!(matches!(
            OpenAiEmbedder::new(&config),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let config = RagConfig {
            api_key: "key".to_string(),
            api_base_url: "http://localhost:8080/v1/".to_string(),
            ..RagConfig::default()
        };
        let embedder = OpenAiEmbedder::new(&config).unwrap();
        assert_eq!(embedder.endpoint, "http://localhost:8080/v1/embeddings");
    }

    #[test]
    fn test_transient_statuses() {
        use reqwest::StatusCode;
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert!(retry_backoff(1) < retry_backoff(2));
        assert!(retry_backoff(2) < retry_backoff(3));
        assert_eq!(retry_backoff(6), retry_backoff(60));
    }
}
