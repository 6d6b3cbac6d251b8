//! Dataset loading from per-model result folders

use serde_json::Value;
use std::path::{Path, PathBuf};

use super::TaskDefinition;

/// File name of every task's result set inside its task folder
pub const DATASET_FILE: &str = "data.json";

/// Error type for dataset loading
#[derive(Debug, thiserror::Error)]
pub enum DatasetLoadError {
    #[error("dataset not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected a JSON array of records in {}, found {found}", path.display())]
    NotAnArray { path: PathBuf, found: &'static str },
}

impl DatasetLoadError {
    pub fn path(&self) -> &Path {
        match self {
            DatasetLoadError::Missing { path }
            | DatasetLoadError::Io { path, .. }
            | DatasetLoadError::Parse { path, .. }
            | DatasetLoadError::NotAnArray { path, .. } => path,
        }
    }
}

/// `<model_base>/<task_subpath>/data.json`
pub fn dataset_path(model_base: &Path, task: &TaskDefinition) -> PathBuf {
    model_base.join(&task.dataset_path).join(DATASET_FILE)
}

/// Load the raw records of one (model, task) dataset file
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Vec<Value>, DatasetLoadError> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            DatasetLoadError::Missing { path: path.to_path_buf() }
        } else {
            DatasetLoadError::Io { path: path.to_path_buf(), source }
        }
    })?;

    load_dataset_from_str(&content, path)
}

/// Parse dataset content; `path` is only used for error context
pub fn load_dataset_from_str(content: &str, path: &Path) -> Result<Vec<Value>, DatasetLoadError> {
    let value: Value = serde_json::from_str(content).map_err(|source| DatasetLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Array(records) => {
            tracing::debug!("Loaded {} records from {}", records.len(), path.display());
            Ok(records)
        }
        other => Err(DatasetLoadError::NotAnArray {
            path: path.to_path_buf(),
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::MetricKind;

    #[test]
    fn test_dataset_path_layout() {
        let task = TaskDefinition::new("note_gender", "gender/v2", MetricKind::ExactContainment);
        let path = dataset_path(Path::new("/results/model-a"), &task);
        assert_eq!(path, PathBuf::from("/results/model-a/gender/v2/data.json"));
    }

    #[test]
    fn test_load_from_str() {
        let json = r#"[
            {"conversations": [{"value": "q"}, {"value": "a"}], "model_result": "a"},
            {"conversations": [{"value": "q"}, {"value": "b"}], "model_result": "c"}
        ]"#;

        let records = load_dataset_from_str(json, Path::new("data.json")).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_load_rejects_object() {
        let err = load_dataset_from_str(r#"{"records": []}"#, Path::new("x/data.json")).unwrap_err();
        assert!(matches!(err, DatasetLoadError::NotAnArray { found: "an object", .. }));
        assert_eq!(err.path(), Path::new("x/data.json"));
    }

    #[test]
    fn test_load_malformed_json() {
        let err = load_dataset_from_str("[{\"conversations\": ", Path::new("data.json")).unwrap_err();
        assert!(matches!(err, DatasetLoadError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dataset(dir.path().join("nope").join(DATASET_FILE)).unwrap_err();
        assert!(matches!(err, DatasetLoadError::Missing { .. }));
    }

    #[test]
    fn test_load_empty_array_is_ok() {
        let records = load_dataset_from_str("[]", Path::new("data.json")).unwrap();
        assert!(records.is_empty());
    }
}
