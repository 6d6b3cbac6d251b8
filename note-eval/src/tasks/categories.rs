//! Metric kind definitions

use serde::{Deserialize, Serialize};

/// Scoring algorithm applied to every record of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Prediction must appear verbatim inside the reference
    #[serde(alias = "calculate_answer_accuracy")]
    ExactContainment,
    /// Position-wise token containment, rewarding up to three levels
    #[serde(rename = "token_partial_3", alias = "calculate_three_level_accuracy")]
    TokenPartial3,
    /// Set F1 over space-separated labels
    #[serde(alias = "calculate_multiple_choice_f1")]
    MultiLabelF1,
    /// Cosine similarity of normalized embeddings
    #[serde(alias = "calculate_semantic_similarity")]
    SemanticSimilarity,
    /// Mean of ROUGE, character BLEU and semantic similarity
    #[serde(alias = "calculate_ocr_metrics")]
    TaxonomyOcrComposite,
}

impl MetricKind {
    pub fn all() -> Vec<MetricKind> {
        vec![
            MetricKind::ExactContainment,
            MetricKind::TokenPartial3,
            MetricKind::MultiLabelF1,
            MetricKind::SemanticSimilarity,
            MetricKind::TaxonomyOcrComposite,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::ExactContainment => "exact_containment",
            MetricKind::TokenPartial3 => "token_partial_3",
            MetricKind::MultiLabelF1 => "multi_label_f1",
            MetricKind::SemanticSimilarity => "semantic_similarity",
            MetricKind::TaxonomyOcrComposite => "taxonomy_ocr_composite",
        }
    }

    /// Whether scoring needs the shared embedding resource
    pub fn requires_embeddings(&self) -> bool {
        matches!(
            self,
            MetricKind::SemanticSimilarity | MetricKind::TaxonomyOcrComposite
        )
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact_containment" | "exact" | "calculate_answer_accuracy" => {
                Ok(MetricKind::ExactContainment)
            }
            "token_partial_3" | "three_level" | "calculate_three_level_accuracy" => {
                Ok(MetricKind::TokenPartial3)
            }
            "multi_label_f1" | "f1" | "calculate_multiple_choice_f1" => {
                Ok(MetricKind::MultiLabelF1)
            }
            "semantic_similarity" | "semantic" | "calculate_semantic_similarity" => {
                Ok(MetricKind::SemanticSimilarity)
            }
            "taxonomy_ocr_composite" | "ocr" | "calculate_ocr_metrics" => {
                Ok(MetricKind::TaxonomyOcrComposite)
            }
            _ => Err(format!("Unknown metric kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metric_kind() {
        assert_eq!("exact_containment".parse::<MetricKind>().unwrap(), MetricKind::ExactContainment);
        assert_eq!("Token_Partial_3".parse::<MetricKind>().unwrap(), MetricKind::TokenPartial3);
        assert_eq!(
            "calculate_ocr_metrics".parse::<MetricKind>().unwrap(),
            MetricKind::TaxonomyOcrComposite
        );
        assert!("levenshtein".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_serde_names_round_trip_through_as_str() {
        for kind in MetricKind::all() {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_legacy_alias_deserializes() {
        let kind: MetricKind = serde_json::from_str("\"calculate_multiple_choice_f1\"").unwrap();
        assert_eq!(kind, MetricKind::MultiLabelF1);
    }

    #[test]
    fn test_requires_embeddings() {
        assert!(MetricKind::SemanticSimilarity.requires_embeddings());
        assert!(MetricKind::TaxonomyOcrComposite.requires_embeddings());
        assert!(!MetricKind::MultiLabelF1.requires_embeddings());
    }
}
