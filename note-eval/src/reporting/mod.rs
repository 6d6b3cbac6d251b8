//! Results reporting

pub mod csv_writer;

pub use csv_writer::{ScoreTable, TOTAL_ROW};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::runner::{EvaluationRun, ModelFailure, TaskOutcome};
use crate::tasks::TaskRegistry;

/// Errors while writing reports
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("encoding error: {0}")]
    Encoding(String),
}

/// JSON summary export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub total_tasks: usize,
    pub models: Vec<ModelSummary>,
    pub failures: Vec<ModelFailure>,
    pub score_table_file: String,
}

/// Per-model entry of the summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model_id: String,
    pub total_score: f64,
    pub failed_records: usize,
    pub tasks: Vec<TaskOutcome>,
}

impl JsonSummary {
    /// Create from a finished run
    pub fn from_run(
        run_id: impl Into<String>,
        started_at: DateTime<Utc>,
        run: &EvaluationRun,
        registry: &TaskRegistry,
        score_table_file: impl Into<String>,
    ) -> Self {
        let models = run
            .models
            .values()
            .map(|scores| ModelSummary {
                model_id: scores.model_id.clone(),
                total_score: scores.total_score,
                failed_records: scores.failed_records(),
                tasks: scores.tasks.values().cloned().collect(),
            })
            .collect();

        Self {
            run_id: run_id.into(),
            started_at: started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            total_tasks: registry.len(),
            models,
            failures: run.failures.clone(),
            score_table_file: score_table_file.into(),
        }
    }

    /// Write to JSON file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Generate a console report
pub fn print_console_report(run: &EvaluationRun, registry: &TaskRegistry) {
    println!("\n=== Note Evaluation Results ===\n");
    println!("Tasks: {}  Models: {}\n", registry.len(), run.models.len() + run.failures.len());

    if !run.models.is_empty() {
        println!("Model Rankings:");
        println!("{:-<50}", "");

        let mut rankings: Vec<_> = run.models.values().collect();
        rankings.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for (i, scores) in rankings.iter().enumerate() {
            let failed = scores.failed_records();
            if failed > 0 {
                println!(
                    "  {}. {} - Total: {:.4} ({} records unscored)",
                    i + 1,
                    scores.model_id,
                    scores.total_score,
                    failed
                );
            } else {
                println!("  {}. {} - Total: {:.4}", i + 1, scores.model_id, scores.total_score);
            }
        }

        println!("\nScores by Task:");
        println!("{:-<50}", "");

        for task in registry.iter() {
            println!("  {} ({}):", task.id, task.metric);
            for scores in run.models.values() {
                if let Some(score) = scores.score(&task.id) {
                    println!("    {}: {:.4}", scores.model_id, score);
                }
            }
        }
    }

    if !run.failures.is_empty() {
        println!("\nFailed Models:");
        println!("{:-<50}", "");
        for failure in &run.failures {
            println!("  {}: {}", failure.model_id, failure.error);
        }
    }

    println!("\n{:=<50}", "");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ModelScores;
    use crate::tasks::{MetricKind, TaskDefinition};
    use indexmap::IndexMap;

    fn sample_run() -> (EvaluationRun, TaskRegistry) {
        let registry = TaskRegistry::from_definitions(vec![TaskDefinition::new(
            "note_gender",
            "note_gender",
            MetricKind::ExactContainment,
        )])
        .unwrap();

        let mut tasks = IndexMap::new();
        tasks.insert(
            "note_gender".to_string(),
            TaskOutcome {
                task_id: "note_gender".into(),
                metric: MetricKind::ExactContainment,
                score: 0.75,
                records: 4,
                failed_records: 1,
            },
        );

        let mut run = EvaluationRun::default();
        run.models.insert(
            "qwen".into(),
            ModelScores {
                model_id: "qwen".into(),
                tasks,
                total_score: 0.75,
            },
        );
        run.failures.push(ModelFailure {
            model_id: "glm".into(),
            task_id: "note_gender".into(),
            error: "dataset file not found".into(),
        });
        (run, registry)
    }

    #[test]
    fn test_summary_from_run() {
        let (run, registry) = sample_run();
        let summary = JsonSummary::from_run("20261016-120000", Utc::now(), &run, &registry, "result.csv");

        assert_eq!(summary.total_tasks, 1);
        assert_eq!(summary.models.len(), 1);
        assert_eq!(summary.models[0].failed_records, 1);
        assert_eq!(summary.models[0].tasks[0].records, 4);
        assert_eq!(summary.failures[0].model_id, "glm");
    }

    #[test]
    fn test_summary_write() {
        let (run, registry) = sample_run();
        let summary = JsonSummary::from_run("run", Utc::now(), &run, &registry, "result.csv");

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("summary.json");
        summary.write_to_file(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["models"][0]["tasks"][0]["metric"], "exact_containment");
        assert_eq!(value["failures"][0]["task_id"], "note_gender");
    }
}
