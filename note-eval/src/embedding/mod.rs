//! Shared embedding resource

pub mod hashed;
pub mod openai;
pub mod tei;
pub mod traits;

pub use hashed::HashedNgramEmbedder;
pub use openai::OpenAIEmbedder;
pub use tei::TeiEmbedder;
pub use traits::{cosine_similarity, normalize, Embedder, EmbeddingError, EmbeddingResult, RetryPolicy};

use std::sync::Arc;

use crate::config::{Config, EmbeddingBackend};

/// Build the process-wide embedder described by `config`.
///
/// Called once at startup; the returned handle is shared by every scoring call.
pub fn create_embedder(config: &Config) -> EmbeddingResult<Arc<dyn Embedder>> {
    let settings = &config.embedding;
    let retry = RetryPolicy {
        retry_count: settings.retry_count,
        retry_delay_ms: settings.retry_delay_ms,
        max_retry_delay_ms: settings.max_retry_delay_ms,
    };

    let api_key = match &settings.api_key_env {
        Some(var) => match std::env::var(var) {
            Ok(key) if !key.is_empty() => Some(key),
            _ => {
                tracing::warn!("{} is not set, sending embedding requests without a token", var);
                None
            }
        },
        None => None,
    };

    let embedder: Arc<dyn Embedder> = match settings.backend {
        EmbeddingBackend::Tei => {
            let base = remote_base(config)?;
            let mut client = TeiEmbedder::new(base)
                .with_timeout(settings.timeout_ms)?
                .with_retry(retry);
            if let Some(key) = api_key {
                client = client.with_api_key(key);
            }
            Arc::new(client)
        }
        EmbeddingBackend::OpenAi => {
            let base = remote_base(config)?;
            let mut client = OpenAIEmbedder::new(base)
                .with_model(&settings.model)
                .with_timeout(settings.timeout_ms)?
                .with_retry(retry);
            if let Some(key) = api_key {
                client = client.with_api_key(key);
            }
            Arc::new(client)
        }
        EmbeddingBackend::Hashed => Arc::new(HashedNgramEmbedder::new(settings.dimensions)),
    };

    tracing::info!("Embedding backend: {} ({})", embedder.name(), config.bge_path);
    Ok(embedder)
}

/// Embed one sample text at startup so an unreachable backend stops the run
/// before any dataset is scored.
pub async fn verify_embedder(embedder: &dyn Embedder) -> EmbeddingResult<()> {
    if embedder.health_check().await? {
        tracing::debug!("Embedding backend {} is healthy", embedder.name());
        Ok(())
    } else {
        Err(EmbeddingError::Parse(format!(
            "{} backend returned no embedding",
            embedder.name()
        )))
    }
}

fn remote_base(config: &Config) -> EmbeddingResult<&str> {
    let base = config.bge_path.trim();
    if base.starts_with("http://") || base.starts_with("https://") {
        Ok(base)
    } else {
        Err(EmbeddingError::Config(format!(
            "bge_path must be the URL of an embedding server for the {} backend, got {:?}",
            config.embedding.backend, config.bge_path
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashed_backend_needs_no_url() {
        let mut config = Config::default();
        config.embedding.backend = EmbeddingBackend::Hashed;
        config.bge_path = String::new();

        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.name(), "hashed");
    }

    #[test]
    fn test_remote_backend_rejects_filesystem_path() {
        let mut config = Config::default();
        config.embedding.backend = EmbeddingBackend::Tei;
        config.bge_path = "/models/bge-large-zh-v1.5".to_string();

        let err = create_embedder(&config).err().unwrap();
        assert!(matches!(err, EmbeddingError::Config(_)));
    }

    #[tokio::test]
    async fn test_verify_hashed_backend() {
        verify_embedder(&HashedNgramEmbedder::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_unreachable_backend_fails() {
        let embedder = TeiEmbedder::new("http://127.0.0.1:9").with_retry(RetryPolicy::none());
        let err = verify_embedder(&embedder).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Http(_)));
    }

    #[test]
    fn test_openai_backend_builds() {
        let mut config = Config::default();
        config.embedding.backend = EmbeddingBackend::OpenAi;
        config.bge_path = "http://localhost:9997/v1".to_string();

        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.name(), "openai");
    }
}
