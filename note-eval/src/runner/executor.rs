//! Sequential evaluation of every model against every registered task

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analysis::{RecordScoringError, Scorer, TextQuality};
use crate::embedding::EmbeddingError;
use crate::tasks::{
    dataset_path, load_dataset, DatasetLoadError, EvaluationRecord, MetricKind, TaskDefinition, TaskRegistry,
};

/// Fatal error for one model; other models keep running
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("model {model}, task {task}: {source}")]
    DatasetLoad {
        model: String,
        task: String,
        #[source]
        source: DatasetLoadError,
    },

    #[error("model {model}, task {task}: dataset has no records")]
    EmptyDataset { model: String, task: String },

    #[error("model {model}, task {task}, record {index}: embedding backend unavailable: {source}")]
    EmbeddingUnavailable {
        model: String,
        task: String,
        index: usize,
        #[source]
        source: EmbeddingError,
    },
}

impl EvalError {
    pub fn model(&self) -> &str {
        match self {
            EvalError::DatasetLoad { model, .. }
            | EvalError::EmptyDataset { model, .. }
            | EvalError::EmbeddingUnavailable { model, .. } => model,
        }
    }

    pub fn task(&self) -> &str {
        match self {
            EvalError::DatasetLoad { task, .. }
            | EvalError::EmptyDataset { task, .. }
            | EvalError::EmbeddingUnavailable { task, .. } => task,
        }
    }
}

/// Result of scoring one (model, task) dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub metric: MetricKind,
    /// Mean record score
    pub score: f64,
    pub records: usize,
    /// Records that could not be scored and counted as 0
    pub failed_records: usize,
}

/// One completed row of the score table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScores {
    pub model_id: String,
    /// Per-task outcomes in registry order
    pub tasks: IndexMap<String, TaskOutcome>,
    /// Unweighted mean of the per-task scores
    pub total_score: f64,
}

impl ModelScores {
    pub fn score(&self, task_id: &str) -> Option<f64> {
        self.tasks.get(task_id).map(|t| t.score)
    }

    pub fn failed_records(&self) -> usize {
        self.tasks.values().map(|t| t.failed_records).sum()
    }
}

/// A model that produced no row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFailure {
    pub model_id: String,
    pub task_id: String,
    pub error: String,
}

impl From<&EvalError> for ModelFailure {
    fn from(err: &EvalError) -> Self {
        Self {
            model_id: err.model().to_string(),
            task_id: err.task().to_string(),
            error: err.to_string(),
        }
    }
}

/// Everything one run produced, in configuration order
#[derive(Debug, Clone, Default)]
pub struct EvaluationRun {
    pub models: IndexMap<String, ModelScores>,
    pub failures: Vec<ModelFailure>,
}

impl EvaluationRun {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Arithmetic mean; `None` when there is nothing to average
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Runs the model x task matrix one record at a time
pub struct Evaluator {
    registry: TaskRegistry,
    scorer: Scorer,
    progress: Arc<dyn ProgressCallback>,
}

impl Evaluator {
    pub fn new(registry: TaskRegistry, scorer: Scorer) -> Self {
        Self {
            registry,
            scorer,
            progress: Arc::new(NoOpProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Evaluate every model; a failing model is recorded and skipped
    pub async fn run(&self, models: &IndexMap<String, PathBuf>) -> EvaluationRun {
        let mut run = EvaluationRun::default();
        let total = models.len();

        for (index, (model_id, base)) in models.iter().enumerate() {
            match self.evaluate_model(model_id, base).await {
                Ok(scores) => {
                    tracing::info!("{}: total_score {:.4}", model_id, scores.total_score);
                    run.models.insert(model_id.clone(), scores);
                }
                Err(e) => {
                    tracing::error!("Evaluation of {} failed: {}", model_id, e);
                    run.failures.push(ModelFailure::from(&e));
                }
            }
            self.progress.on_progress(index + 1, total);
        }

        run
    }

    /// Evaluate all registered tasks for one model
    pub async fn evaluate_model(&self, model_id: &str, base: &Path) -> Result<ModelScores, EvalError> {
        let mut tasks = IndexMap::new();

        for task in self.registry.iter() {
            self.progress.on_task_start(&task.id, model_id);
            let outcome = self.evaluate_task(model_id, base, task).await;
            self.progress.on_task_complete(&task.id, model_id, outcome.is_ok());
            let outcome = outcome?;
            tasks.insert(task.id.clone(), outcome);
        }

        let scores: Vec<f64> = tasks.values().map(|t| t.score).collect();
        let total_score = mean(&scores).unwrap_or(0.0);

        Ok(ModelScores {
            model_id: model_id.to_string(),
            tasks,
            total_score,
        })
    }

    /// Load and score one task's dataset for one model
    pub async fn evaluate_task(
        &self,
        model_id: &str,
        base: &Path,
        task: &TaskDefinition,
    ) -> Result<TaskOutcome, EvalError> {
        let path = dataset_path(base, task);
        tracing::debug!("Loading {} for {}: {}", task.id, model_id, path.display());

        let records = load_dataset(&path).map_err(|source| EvalError::DatasetLoad {
            model: model_id.to_string(),
            task: task.id.clone(),
            source,
        })?;

        self.score_dataset(model_id, task, &records).await
    }

    /// Score already-loaded records.
    ///
    /// A record that cannot be scored counts as 0, unless the embedding backend
    /// itself failed, which aborts the model.
    pub async fn score_dataset(
        &self,
        model_id: &str,
        task: &TaskDefinition,
        records: &[Value],
    ) -> Result<TaskOutcome, EvalError> {
        ensure_records(model_id, task, records)?;

        let mut sum = 0.0;
        let mut failed_records = 0;

        for (index, record) in records.iter().enumerate() {
            match self.scorer.score_value(task.metric, record).await {
                Ok(score) => sum += score,
                Err(e) => {
                    record_failure(model_id, task, index, e)?;
                    failed_records += 1;
                }
            }
        }

        Ok(outcome(model_id, task, records.len(), sum, failed_records))
    }

    /// Score records with the composite metric, keeping the component means.
    ///
    /// The outcome score equals the mean `overall` of the returned breakdown.
    pub async fn text_quality_dataset(
        &self,
        model_id: &str,
        task: &TaskDefinition,
        records: &[Value],
    ) -> Result<(TaskOutcome, TextQuality), EvalError> {
        ensure_records(model_id, task, records)?;

        let mut qualities = Vec::with_capacity(records.len());
        let mut failed_records = 0;

        for (index, value) in records.iter().enumerate() {
            let quality = match EvaluationRecord::from_value(value) {
                Ok(record) => self.scorer.text_quality(&record).await,
                Err(e) => Err(e),
            };
            match quality {
                Ok(q) => qualities.push(q),
                Err(e) => {
                    record_failure(model_id, task, index, e)?;
                    qualities.push(TextQuality::default());
                    failed_records += 1;
                }
            }
        }

        let mean = TextQuality::mean(&qualities).unwrap_or_default();
        let sum = mean.overall * records.len() as f64;
        Ok((outcome(model_id, task, records.len(), sum, failed_records), mean))
    }
}

fn ensure_records(model_id: &str, task: &TaskDefinition, records: &[Value]) -> Result<(), EvalError> {
    if records.is_empty() {
        return Err(EvalError::EmptyDataset {
            model: model_id.to_string(),
            task: task.id.clone(),
        });
    }
    Ok(())
}

/// Log a record that scores 0, or escalate when the embedding backend is down
fn record_failure(
    model_id: &str,
    task: &TaskDefinition,
    index: usize,
    err: RecordScoringError,
) -> Result<(), EvalError> {
    match err {
        RecordScoringError::Embedding(source) if !source.is_input_error() => {
            Err(EvalError::EmbeddingUnavailable {
                model: model_id.to_string(),
                task: task.id.clone(),
                index,
                source,
            })
        }
        e => {
            tracing::warn!(
                "model {}, task {}, record {}: {}; scoring as 0",
                model_id,
                task.id,
                index,
                e
            );
            Ok(())
        }
    }
}

fn outcome(model_id: &str, task: &TaskDefinition, records: usize, sum: f64, failed_records: usize) -> TaskOutcome {
    let score = sum / records as f64;
    tracing::debug!(
        "{} on {}: {:.4} over {} records ({} failed)",
        model_id,
        task.id,
        score,
        records,
        failed_records
    );

    TaskOutcome {
        task_id: task.id.clone(),
        metric: task.metric,
        score,
        records,
        failed_records,
    }
}

/// Progress callback for tracking execution
pub trait ProgressCallback: Send + Sync {
    fn on_task_start(&self, task_id: &str, model: &str);
    fn on_task_complete(&self, task_id: &str, model: &str, success: bool);
    fn on_progress(&self, completed: usize, total: usize);
}

/// Default no-op progress callback
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_task_start(&self, _task_id: &str, _model: &str) {}
    fn on_task_complete(&self, _task_id: &str, _model: &str, _success: bool) {}
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Console progress callback
pub struct ConsoleProgress;

impl ProgressCallback for ConsoleProgress {
    fn on_task_start(&self, task_id: &str, model: &str) {
        println!("  Scoring {} for {}...", task_id, model);
    }

    fn on_task_complete(&self, task_id: &str, model: &str, success: bool) {
        let status = if success { "OK" } else { "FAILED" };
        println!("  {} {} for {}", status, task_id, model);
    }

    fn on_progress(&self, completed: usize, total: usize) {
        println!("Progress: {}/{} models evaluated", completed, total);
    }
}
