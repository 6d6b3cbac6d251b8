//! Record scoring: the metric functions and the dispatcher that applies them

pub mod metrics;
pub mod scoring;
pub mod text_quality;

pub use metrics::{
    exact_containment, multi_label_breakdown, multi_label_f1, token_partial_3, F1Breakdown,
    MetricValue, TAXONOMY_LEVELS,
};
pub use scoring::{RecordScoringError, Scorer, TextQuality};
pub use text_quality::{char_bleu, rouge_1, rouge_l, rouge_tokenize, RougeScore};
