//! Score table and its CSV rendering
//!
//! Columns are models in configuration order, rows are tasks in registry
//! order followed by `total_score`. The header's first cell is empty.

use indexmap::IndexMap;
use std::io::Write;
use std::path::Path;

use super::ReportError;
use crate::runner::EvaluationRun;
use crate::tasks::TaskRegistry;

/// Row label of the per-model total
pub const TOTAL_ROW: &str = "total_score";

/// model id -> row label -> score
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTable {
    rows: Vec<String>,
    columns: IndexMap<String, IndexMap<String, f64>>,
}

impl ScoreTable {
    /// Build from a finished run; failed models get no column
    pub fn from_run(run: &EvaluationRun, registry: &TaskRegistry) -> Self {
        let mut rows: Vec<String> = registry.ids().into_iter().map(String::from).collect();
        rows.push(TOTAL_ROW.to_string());

        let columns = run
            .models
            .iter()
            .map(|(model_id, scores)| {
                let mut column: IndexMap<String, f64> = scores
                    .tasks
                    .iter()
                    .map(|(task, outcome)| (task.clone(), outcome.score))
                    .collect();
                column.insert(TOTAL_ROW.to_string(), scores.total_score);
                (model_id.clone(), column)
            })
            .collect();

        Self { rows, columns }
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn get(&self, model: &str, row: &str) -> Option<f64> {
        self.columns.get(model).and_then(|c| c.get(row)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Write CSV to any sink
    pub fn write_csv<W: Write>(&self, sink: W) -> Result<(), ReportError> {
        let mut writer = csv::Writer::from_writer(sink);

        let mut header = vec![String::new()];
        header.extend(self.columns.keys().cloned());
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.clone()];
            record.extend(self.columns.values().map(|column| {
                column.get(row).map(|v| format_score(*v)).unwrap_or_default()
            }));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Write CSV to a file, creating parent directories
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }

    pub fn to_csv_string(&self) -> Result<String, ReportError> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ReportError::Encoding(e.to_string()))
    }
}

/// Shortest round-trip representation, always with a decimal point
fn format_score(value: f64) -> String {
    format!("{:?}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{ModelScores, TaskOutcome};
    use crate::tasks::{MetricKind, TaskDefinition};

    fn registry() -> TaskRegistry {
        TaskRegistry::from_definitions(vec![
            TaskDefinition::new("note_gender", "note_gender", MetricKind::ExactContainment),
            TaskDefinition::new("note_hashtag_multi", "note_hashtag_multi", MetricKind::MultiLabelF1),
        ])
        .unwrap()
    }

    fn scores(model: &str, gender: f64, hashtag: f64) -> ModelScores {
        let mut tasks = IndexMap::new();
        for (id, metric, score) in [
            ("note_gender", MetricKind::ExactContainment, gender),
            ("note_hashtag_multi", MetricKind::MultiLabelF1, hashtag),
        ] {
            tasks.insert(
                id.to_string(),
                TaskOutcome {
                    task_id: id.to_string(),
                    metric,
                    score,
                    records: 2,
                    failed_records: 0,
                },
            );
        }
        ModelScores {
            model_id: model.to_string(),
            tasks,
            total_score: (gender + hashtag) / 2.0,
        }
    }

    fn run() -> EvaluationRun {
        let mut run = EvaluationRun::default();
        run.models.insert("model-b".into(), scores("model-b", 0.5, 0.25));
        run.models.insert("model-a".into(), scores("model-a", 1.0, 1.0));
        run
    }

    #[test]
    fn test_table_layout() {
        let table = ScoreTable::from_run(&run(), &registry());
        assert_eq!(table.models().collect::<Vec<_>>(), vec!["model-b", "model-a"]);
        assert_eq!(table.rows(), &["note_gender", "note_hashtag_multi", "total_score"]);
        assert_eq!(table.get("model-b", "note_hashtag_multi"), Some(0.25));
        assert_eq!(table.get("model-b", TOTAL_ROW), Some(0.375));
        assert_eq!(table.get("missing", TOTAL_ROW), None);
    }

    #[test]
    fn test_csv_output() {
        let csv = ScoreTable::from_run(&run(), &registry()).to_csv_string().unwrap();
        let expected = "\
,model-b,model-a
note_gender,0.5,1.0
note_hashtag_multi,0.25,1.0
total_score,0.375,1.0
";
        assert_eq!(csv, expected);
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out").join("result.csv");

        ScoreTable::from_run(&run(), &registry()).write_to_file(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(",model-b,model-a\n"));
    }
}
