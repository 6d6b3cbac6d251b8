//! Task definitions, the task registry and evaluation records

pub mod categories;
pub mod loader;

pub use categories::MetricKind;
pub use loader::{dataset_path, load_dataset, load_dataset_from_str, DatasetLoadError, DATASET_FILE};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::analysis::RecordScoringError;

/// One evaluation category: which metric applies and where its results live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: String,
    /// Sub-directory under each model's base directory
    pub dataset_path: String,
    pub metric: MetricKind,
}

impl TaskDefinition {
    pub fn new(id: impl Into<String>, dataset_path: impl Into<String>, metric: MetricKind) -> Self {
        Self {
            id: id.into(),
            dataset_path: dataset_path.into(),
            metric,
        }
    }

    /// Full path of this task's dataset file for a model rooted at `model_base`
    pub fn dataset_file(&self, model_base: &Path) -> PathBuf {
        dataset_path(model_base, self)
    }
}

/// Errors raised while assembling a registry
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate task id: {0}")]
    Duplicate(String),

    #[error("unknown task id: {0}")]
    UnknownTask(String),

    #[error("task registry is empty")]
    Empty,
}

/// Ordered set of task definitions; iteration follows insertion order
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: IndexMap<String, TaskDefinition>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The twelve note-understanding tasks of the reference deployment
    pub fn default_registry() -> Self {
        use MetricKind::*;

        let entries = [
            // MRC
            ("note_mrc", SemanticSimilarity),
            // Hashtag
            ("note_hashtag_single", ExactContainment),
            ("note_hashtag_multi", MultiLabelF1),
            // Taxonomy
            ("note_taxonomy_one_level", TokenPartial3),
            ("note_taxonomy_three_levels", ExactContainment),
            // Gender
            ("note_gender", ExactContainment),
            // Query correlation
            ("note_querycorr_two_levels", ExactContainment),
            ("note_querycorr_five_levels", ExactContainment),
            // Comments
            ("note_comment_primary", ExactContainment),
            ("note_comment_sub_level", ExactContainment),
            // OCR
            ("note_ocr", TaxonomyOcrComposite),
            // Query generation
            ("note_query_gen", ExactContainment),
        ];

        let tasks = entries
            .into_iter()
            .map(|(id, metric)| (id.to_string(), TaskDefinition::new(id, id, metric)))
            .collect();

        Self { tasks }
    }

    /// Build a registry from definitions, rejecting duplicates and empty input
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = TaskDefinition>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for def in definitions {
            registry.register(def)?;
        }
        if registry.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(registry)
    }

    /// Add a task at the end of the registry
    pub fn register(&mut self, task: TaskDefinition) -> Result<(), RegistryError> {
        if self.tasks.contains_key(&task.id) {
            return Err(RegistryError::Duplicate(task.id));
        }
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Keep only the named tasks, preserving registry order
    pub fn retain_ids(&self, ids: &[&str]) -> Result<Self, RegistryError> {
        for id in ids {
            if !self.tasks.contains_key(*id) {
                return Err(RegistryError::UnknownTask(id.to_string()));
            }
        }

        let tasks: IndexMap<String, TaskDefinition> = self
            .tasks
            .iter()
            .filter(|(id, _)| ids.contains(&id.as_str()))
            .map(|(id, def)| (id.clone(), def.clone()))
            .collect();

        if tasks.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(Self { tasks })
    }

    pub fn get(&self, id: &str) -> Option<&TaskDefinition> {
        self.tasks.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.tasks.values()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Whether any registered task needs the embedding resource
    pub fn requires_embeddings(&self) -> bool {
        self.iter().any(|t| t.metric.requires_embeddings())
    }
}

/// One reference/prediction pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub reference: String,
    /// Absent when the model produced no usable `model_result`
    pub prediction: Option<String>,
}

impl EvaluationRecord {
    pub fn new(reference: impl Into<String>, prediction: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            prediction: Some(prediction.into()),
        }
    }

    pub fn without_prediction(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            prediction: None,
        }
    }

    /// Extract a record from a raw dataset entry.
    ///
    /// The reference is the `value` of the second conversation turn; the
    /// prediction is the top-level `model_result` string.
    pub fn from_value(value: &Value) -> Result<Self, RecordScoringError> {
        let turns = value
            .get("conversations")
            .and_then(Value::as_array)
            .ok_or_else(|| RecordScoringError::InvalidRecord("missing conversations array".to_string()))?;

        let reference = turns
            .get(1)
            .and_then(|turn| turn.get("value"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RecordScoringError::InvalidRecord(format!(
                    "conversations[1].value is missing or not a string ({} turns)",
                    turns.len()
                ))
            })?
            .to_string();

        let prediction = value
            .get("model_result")
            .and_then(Value::as_str)
            .map(String::from);

        Ok(Self { reference, prediction })
    }

    /// Prediction text, empty when absent
    pub fn prediction_text(&self) -> &str {
        self.prediction.as_deref().unwrap_or("")
    }
}
