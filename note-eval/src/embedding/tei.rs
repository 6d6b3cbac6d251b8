//! Client for a text-embeddings-inference server hosting a BGE model

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::traits::{normalize, Embedder, EmbeddingError, EmbeddingResult, RetryPolicy};

/// Embedder backed by the `/embed` route of text-embeddings-inference
pub struct TeiEmbedder {
    base_url: String,
    api_key: Option<String>,
    http_client: Client,
    retry: RetryPolicy,
}

impl TeiEmbedder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            http_client: Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Bearer token sent with every request
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> EmbeddingResult<Self> {
        self.http_client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(self)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn embed_once(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let body = TeiRequest {
            inputs: texts,
            normalize: true,
            truncate: true,
        };

        let mut request = self
            .http_client
            .post(format!("{}/embed", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<TeiError>(&body) {
                Ok(error) => error.error,
                Err(_) => format!("HTTP {}: {}", status.as_u16(), body),
            };
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let mut vectors: Vec<Vec<f32>> = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Parse(format!("invalid /embed response: {}", e)))?;

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Parse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        // Servers started without normalization still return raw vectors
        for v in &mut vectors {
            normalize(v);
        }
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct TeiRequest<'a> {
    inputs: &'a [&'a str],
    normalize: bool,
    truncate: bool,
}

#[derive(Deserialize)]
struct TeiError {
    error: String,
}

#[async_trait]
impl Embedder for TeiEmbedder {
    fn name(&self) -> &str {
        "tei"
    }

    async fn embed(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.retry.run(self.name(), || self.embed_once(texts)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let embedder = TeiEmbedder::new("http://localhost:8080/");
        assert_eq!(embedder.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_request_shape() {
        let texts = ["a", "b"];
        let body = TeiRequest { inputs: &texts, normalize: true, truncate: true };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["inputs"], serde_json::json!(["a", "b"]));
        assert_eq!(json["normalize"], true);
    }

    #[tokio::test]
    async fn test_empty_input_skips_request() {
        // Unroutable address: any request would fail
        let embedder = TeiEmbedder::new("http://127.0.0.1:9").with_retry(RetryPolicy::none());
        let vectors = embedder.embed(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
