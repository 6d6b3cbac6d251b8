//! Offline embedder: signed feature hashing of character n-grams
//!
//! Needs no model files or server. Useful for dry runs and tests; scores are
//! not comparable with a BGE-backed run.

use async_trait::async_trait;

use super::traits::{normalize, Embedder, EmbeddingResult};

pub const DEFAULT_DIMENSIONS: usize = 512;
const MAX_NGRAM: usize = 3;

pub struct HashedNgramEmbedder {
    dimensions: usize,
}

impl HashedNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Encode one text
    pub fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];
        let chars: Vec<char> = text.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();

        for n in 1..=MAX_NGRAM {
            if chars.len() < n {
                break;
            }
            for window in chars.windows(n) {
                let gram: String = window.iter().collect();
                let hash = crc32fast::hash(gram.as_bytes());
                let bucket = hash as usize % self.dimensions;
                let sign = if hash & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
                // Longer n-grams carry more context
                vector[bucket] += sign * n as f32;
            }
        }

        normalize(&mut vector);
        vector
    }
}

impl Default for HashedNgramEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashedNgramEmbedder {
    fn name(&self) -> &str {
        "hashed"
    }

    async fn embed(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.encode(t)).collect())
    }
}
