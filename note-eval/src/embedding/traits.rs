//! Embedder trait and shared helpers

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;

/// Error types for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

impl EmbeddingError {
    /// Transport failures, throttling and server errors are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Http(_) => true,
            EmbeddingError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Rejections caused by one particular input rather than by the backend.
    ///
    /// Everything else means the resource itself is unusable.
    pub fn is_input_error(&self) -> bool {
        matches!(self, EmbeddingError::Api { status, .. } if matches!(*status, 400 | 413 | 422))
    }
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// A text encoder producing fixed-length, L2-normalized vectors.
///
/// One instance is built at startup and shared read-only by every scoring
/// call for the rest of the process.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Backend name (e.g., "tei", "openai", "hashed")
    fn name(&self) -> &str;

    /// Encode `texts`, returning one normalized vector per input in order
    async fn embed(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Embed a sample text; `Ok(false)` when the backend answers without a usable vector
    async fn health_check(&self) -> EmbeddingResult<bool> {
        let vectors = self.embed(&["health check"]).await?;
        Ok(vectors.first().is_some_and(|v| !v.is_empty()))
    }
}

/// Exponential backoff settings for remote backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay_ms: 500,
            max_retry_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retry_count: 0,
            ..Self::default()
        }
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent
    pub async fn run<T, F, Fut>(&self, backend: &str, mut attempt: F) -> EmbeddingResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = EmbeddingResult<T>>,
    {
        let mut delay = self.retry_delay_ms;
        let mut tries = 0;

        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && tries < self.retry_count => {
                    tries += 1;
                    tracing::warn!(
                        "Embedding request to {} failed ({}), retry {} in {}ms",
                        backend,
                        e,
                        tries,
                        delay
                    );
                    sleep(Duration::from_millis(delay)).await;
                    delay = (delay * 2).min(self.max_retry_delay_ms);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Scale `vector` to unit length in place; zero vectors are left untouched
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two vectors, in [-1, 1]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> EmbeddingResult<f64> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let a = [0.6_f32, 0.8];
        let b = [0.8_f32, -0.6];
        assert!((cosine_similarity(&a, &a).unwrap() - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &b).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_cosine_dimension_mismatch() {
        let err = cosine_similarity(&[1.0, 0.0], &[1.0]).unwrap_err();
        assert!(matches!(err, EmbeddingError::DimensionMismatch { left: 2, right: 1 }));
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_input_errors() {
        assert!(EmbeddingError::Api { status: 413, message: "too long".into() }.is_input_error());
        assert!(!EmbeddingError::Api { status: 503, message: "loading".into() }.is_input_error());
        assert!(!EmbeddingError::Api { status: 404, message: "no route".into() }.is_input_error());
        assert!(!EmbeddingError::Config("bad token".into()).is_input_error());
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0_f32, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0_f32; 3];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0; 3]);
    }

    #[tokio::test]
    async fn test_retry_stops_on_non_retryable() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy { retry_count: 3, retry_delay_ms: 1, max_retry_delay_ms: 2 };

        let result: EmbeddingResult<()> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(EmbeddingError::Api { status: 400, message: "bad input".into() }) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_server_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy { retry_count: 3, retry_delay_ms: 1, max_retry_delay_ms: 2 };

        let result = policy
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(EmbeddingError::Api { status: 503, message: "loading".into() })
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
