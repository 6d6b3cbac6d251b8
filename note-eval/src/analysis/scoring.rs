//! Metric dispatch and the embedding-backed metrics

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::metrics::{self, MetricValue};
use super::text_quality::{char_bleu, rouge_1, rouge_l};
use crate::embedding::{cosine_similarity, Embedder, EmbeddingError};
use crate::tasks::{EvaluationRecord, MetricKind};

/// A single record could not be scored.
///
/// The runner counts the record as 0 unless the embedding backend itself failed.
#[derive(Debug, thiserror::Error)]
pub enum RecordScoringError {
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Component scores of the composite text-quality metric
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TextQuality {
    pub rouge_1: f64,
    pub rouge_l: f64,
    /// Mean of ROUGE-1 and ROUGE-L F-measures
    pub average_rouge: f64,
    pub bleu: f64,
    pub semantic_similarity: f64,
    /// Mean of average ROUGE, BLEU and semantic similarity
    pub overall: f64,
}

impl TextQuality {
    fn from_components(rouge_1: f64, rouge_l: f64, bleu: f64, semantic_similarity: f64) -> Self {
        let average_rouge = (rouge_1 + rouge_l) / 2.0;
        Self {
            rouge_1,
            rouge_l,
            average_rouge,
            bleu,
            semantic_similarity,
            overall: (average_rouge + bleu + semantic_similarity) / 3.0,
        }
    }

    /// Component-wise mean; `None` for an empty slice
    pub fn mean(items: &[TextQuality]) -> Option<TextQuality> {
        if items.is_empty() {
            return None;
        }
        let n = items.len() as f64;
        let sum = |f: fn(&TextQuality) -> f64| items.iter().map(f).sum::<f64>() / n;

        Some(TextQuality {
            rouge_1: sum(|q| q.rouge_1),
            rouge_l: sum(|q| q.rouge_l),
            average_rouge: sum(|q| q.average_rouge),
            bleu: sum(|q| q.bleu),
            semantic_similarity: sum(|q| q.semantic_similarity),
            overall: sum(|q| q.overall),
        })
    }

    /// Convert to breakdown format
    pub fn to_breakdown(&self) -> Vec<MetricValue> {
        vec![
            MetricValue::new("rouge_1", self.rouge_1),
            MetricValue::new("rouge_l", self.rouge_l),
            MetricValue::new("average_rouge", self.average_rouge),
            MetricValue::new("bleu", self.bleu),
            MetricValue::new("semantic_similarity", self.semantic_similarity),
            MetricValue::new("overall_quality", self.overall),
        ]
    }
}

/// Scores records for any [`MetricKind`], sharing one embedder across calls
#[derive(Clone)]
pub struct Scorer {
    embedder: Arc<dyn Embedder>,
}

impl Scorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Score one record with the given metric
    pub async fn score(
        &self,
        kind: MetricKind,
        record: &EvaluationRecord,
    ) -> Result<f64, RecordScoringError> {
        match kind {
            MetricKind::ExactContainment => Ok(metrics::exact_containment(record)),
            MetricKind::TokenPartial3 => Ok(metrics::token_partial_3(record)),
            MetricKind::MultiLabelF1 => Ok(metrics::multi_label_f1(record)),
            MetricKind::SemanticSimilarity => self.semantic_similarity(record).await,
            MetricKind::TaxonomyOcrComposite => Ok(self.text_quality(record).await?.overall),
        }
    }

    /// Extract a record from a raw dataset entry and score it
    pub async fn score_value(&self, kind: MetricKind, value: &Value) -> Result<f64, RecordScoringError> {
        let record = EvaluationRecord::from_value(value)?;
        self.score(kind, &record).await
    }

    /// Cosine similarity of the normalized embeddings of reference and prediction.
    ///
    /// An empty side scores 0 without calling the embedder.
    pub async fn semantic_similarity(&self, record: &EvaluationRecord) -> Result<f64, RecordScoringError> {
        let prediction = record.prediction_text();
        if record.reference.is_empty() || prediction.is_empty() {
            return Ok(0.0);
        }

        let vectors = self.embedder.embed(&[record.reference.as_str(), prediction]).await?;
        match vectors.as_slice() {
            [reference, prediction] => Ok(cosine_similarity(reference, prediction)?),
            other => Err(EmbeddingError::Parse(format!(
                "expected 2 embeddings, got {}",
                other.len()
            ))
            .into()),
        }
    }

    /// Composite of average ROUGE, character BLEU and semantic similarity
    pub async fn text_quality(&self, record: &EvaluationRecord) -> Result<TextQuality, RecordScoringError> {
        let prediction = record.prediction_text();

        let r1 = rouge_1(&record.reference, prediction).fmeasure;
        let rl = rouge_l(&record.reference, prediction).fmeasure;
        let bleu = char_bleu(&record.reference, prediction);
        let semantic = self.semantic_similarity(record).await?;

        Ok(TextQuality::from_components(r1, rl, bleu, semantic))
    }
}
