//! Record-level metrics that need no external resource

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::tasks::EvaluationRecord;

/// Number of taxonomy levels rewarded by [`token_partial_3`]
pub const TAXONOMY_LEVELS: usize = 3;

/// A single named metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub metric: String,
    pub value: f64,
}

impl MetricValue {
    pub fn new(metric: impl Into<String>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            value,
        }
    }
}

/// Set-based precision, recall and F1
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct F1Breakdown {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// 1 when the prediction occurs verbatim inside the reference, else 0.
///
/// This is containment, not equality: a short prediction found anywhere in a
/// long reference scores 1. An absent or empty prediction scores 0.
pub fn exact_containment(record: &EvaluationRecord) -> f64 {
    match record.prediction.as_deref() {
        Some(prediction) if !prediction.is_empty() && record.reference.contains(prediction) => 1.0,
        _ => 0.0,
    }
}

/// Position-wise token containment over space-separated levels.
///
/// Counts positions where the reference token is a substring of the
/// prediction token. Fewer than three comparable positions scores 0;
/// otherwise the count is divided by three, not by the compared length.
pub fn token_partial_3(record: &EvaluationRecord) -> f64 {
    let reference: Vec<&str> = record.reference.split(' ').collect();
    let prediction: Vec<&str> = record.prediction_text().split(' ').collect();

    let compared = reference.len().min(prediction.len());
    if compared < TAXONOMY_LEVELS {
        return 0.0;
    }

    let matches = reference
        .iter()
        .zip(&prediction)
        .filter(|(r, p)| p.contains(**r))
        .count();

    matches as f64 / TAXONOMY_LEVELS as f64
}

/// F1 between the space-separated label sets of reference and prediction
pub fn multi_label_f1(record: &EvaluationRecord) -> f64 {
    multi_label_breakdown(record).f1
}

/// Full precision/recall/F1 breakdown behind [`multi_label_f1`]
pub fn multi_label_breakdown(record: &EvaluationRecord) -> F1Breakdown {
    let reference: HashSet<&str> = record.reference.split(' ').collect();
    let predicted: HashSet<&str> = match record.prediction.as_deref() {
        Some(prediction) => prediction.split(' ').collect(),
        None => {
            tracing::warn!("Record has no model_result, scoring against an empty label set");
            HashSet::new()
        }
    };

    let true_positives = reference.intersection(&predicted).count();
    let false_positives = predicted.difference(&reference).count();
    let false_negatives = reference.difference(&predicted).count();

    let precision = ratio(true_positives, true_positives + false_positives);
    let recall = ratio(true_positives, true_positives + false_negatives);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    F1Breakdown {
        true_positives,
        false_positives,
        false_negatives,
        precision,
        recall,
        f1,
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}
