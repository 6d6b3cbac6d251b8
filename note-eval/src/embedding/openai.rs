//! OpenAI-compatible `/embeddings` client (vLLM, Xinference, hosted APIs)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::traits::{normalize, Embedder, EmbeddingError, EmbeddingResult, RetryPolicy};

const DEFAULT_MODEL: &str = "bge-large-zh-v1.5";

pub struct OpenAIEmbedder {
    base_url: String,
    api_key: Option<String>,
    model: String,
    http_client: Client,
    retry: RetryPolicy,
}

impl OpenAIEmbedder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            http_client: Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
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
        let body = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };

        let mut request = self
            .http_client
            .post(format!("{}/embeddings", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<OpenAIError>(&body) {
                Ok(error) => error.error.message,
                Err(_) => format!("HTTP {}: {}", status.as_u16(), body),
            };

            // 401/403 are auth errors, surfaced as configuration problems
            if status == 401 || status == 403 {
                return Err(EmbeddingError::Config(format!(
                    "embedding auth error ({}): {}",
                    status.as_u16(),
                    message
                )));
            }

            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Parse(format!("invalid /embeddings response: {}", e)))?;

        into_ordered_vectors(api_response, texts.len())
    }
}

/// Reorder by `index` and normalize; servers may answer out of order
fn into_ordered_vectors(
    response: EmbeddingsResponse,
    expected: usize,
) -> EmbeddingResult<Vec<Vec<f32>>> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(EmbeddingError::Parse(format!(
            "expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }

    data.sort_by_key(|d| d.index);
    Ok(data
        .into_iter()
        .map(|d| {
            let mut v = d.embedding;
            normalize(&mut v);
            v
        })
        .collect())
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn name(&self) -> &str {
        "openai"
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
    fn test_response_reordered_by_index() {
        let json = r#"{
            "object": "list",
            "data": [
                {"object": "embedding", "embedding": [0.0, 2.0], "index": 1},
                {"object": "embedding", "embedding": [3.0, 4.0], "index": 0}
            ],
            "model": "bge"
        }"#;
        let response: EmbeddingsResponse = serde_json::from_str(json).unwrap();
        let vectors = into_ordered_vectors(response, 2).unwrap();

        assert_eq!(vectors[0], vec![0.6, 0.8]);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }

    #[test]
    fn test_response_count_mismatch() {
        let response: EmbeddingsResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [1.0], "index": 0}]}"#).unwrap();
        assert!(matches!(
            into_ordered_vectors(response, 2),
            Err(EmbeddingError::Parse(_))
        ));
    }
}
