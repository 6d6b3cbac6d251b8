//! Configuration management for the evaluation run
//!
//! Loads the model registry, embedding settings and optional task registry
//! override from a TOML (or JSON) file.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::tasks::{MetricKind, RegistryError, TaskDefinition, TaskRegistry};

/// Locations searched when no `--config` is given, in order
pub const CONFIG_SEARCH_PATHS: &[&str] = &["config.toml", "config/eval.toml", "config.json"];

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Location of the embedding model resource
    #[serde(default)]
    pub bge_path: String,
    /// Model identifier -> base directory holding its per-task result folders
    #[serde(default)]
    pub model_dict: IndexMap<String, PathBuf>,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Replaces the built-in task registry when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskEntry>,
}

/// Which embedding backend serves `bge_path`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// text-embeddings-inference `/embed`
    Tei,
    /// OpenAI-compatible `/embeddings`
    OpenAi,
    /// Offline hashed n-grams, ignores `bge_path`
    Hashed,
}

impl std::fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EmbeddingBackend::Tei => "tei",
            EmbeddingBackend::OpenAi => "openai",
            EmbeddingBackend::Hashed => "hashed",
        };
        write!(f, "{}", name)
    }
}

/// Embedding client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_backend")]
    pub backend: EmbeddingBackend,
    /// Model name sent to OpenAI-compatible servers
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Environment variable holding a bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    /// Vector size of the hashed backend
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: default_embedding_model(),
            api_key_env: None,
            timeout_ms: default_timeout_ms(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            dimensions: default_dimensions(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_csv_file")]
    pub csv_file: String,
    #[serde(default = "default_true")]
    pub write_summary: bool,
    #[serde(default = "default_summary_file")]
    pub summary_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            csv_file: default_csv_file(),
            write_summary: true,
            summary_file: default_summary_file(),
        }
    }
}

impl OutputConfig {
    pub fn csv_path(&self) -> PathBuf {
        self.output_dir.join(&self.csv_file)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(&self.summary_file)
    }
}

/// A task registry entry as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    pub id: String,
    /// Dataset sub-directory; defaults to the task id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub metric: MetricKind,
}

impl From<&TaskEntry> for TaskDefinition {
    fn from(entry: &TaskEntry) -> Self {
        TaskDefinition::new(
            &entry.id,
            entry.path.clone().unwrap_or_else(|| entry.id.clone()),
            entry.metric,
        )
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_backend() -> EmbeddingBackend { EmbeddingBackend::Tei }
fn default_embedding_model() -> String { "bge-large-zh-v1.5".to_string() }
fn default_timeout_ms() -> u64 { 30_000 }
fn default_retry_count() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 500 }
fn default_max_retry_delay_ms() -> u64 { 10_000 }
fn default_dimensions() -> usize { crate::embedding::hashed::DEFAULT_DIMENSIONS }
fn default_output_dir() -> PathBuf { PathBuf::from(".") }
fn default_csv_file() -> String { "result.csv".to_string() }
fn default_summary_file() -> String { "summary.json".to_string() }

impl Config {
    /// Load configuration from a file; `.json` files are parsed as JSON, anything else as TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_toml(&content),
        }
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from an explicit path, or the first file found in [`CONFIG_SEARCH_PATHS`]
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        if let Some(path) = explicit {
            let config = Self::from_file(path)?;
            return Ok((config, path.to_path_buf()));
        }

        for candidate in CONFIG_SEARCH_PATHS {
            let path = Path::new(candidate);
            if path.is_file() {
                let config = Self::from_file(path)?;
                tracing::info!("Loaded configuration from {}", path.display());
                return Ok((config, path.to_path_buf()));
            }
        }

        Err(ConfigError::NotFound(CONFIG_SEARCH_PATHS.join(", ")))
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Active task registry: the `[[tasks]]` override, or the built-in twelve
    pub fn registry(&self) -> Result<TaskRegistry, ConfigError> {
        if self.tasks.is_empty() {
            return Ok(TaskRegistry::default_registry());
        }
        Ok(TaskRegistry::from_definitions(self.tasks.iter().map(TaskDefinition::from))?)
    }

    /// Check the configuration against the registry it will drive
    pub fn validate(&self, registry: &TaskRegistry) -> Result<(), ConfigError> {
        if self.model_dict.is_empty() {
            return Err(ConfigError::Invalid("model_dict is empty".to_string()));
        }

        if let Some((model, _)) = self.model_dict.iter().find(|(_, p)| p.as_os_str().is_empty()) {
            return Err(ConfigError::Invalid(format!("model_dict.{} has an empty path", model)));
        }

        if registry.requires_embeddings()
            && self.embedding.backend != EmbeddingBackend::Hashed
            && self.bge_path.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "bge_path is required by semantic_similarity and taxonomy_ocr_composite tasks"
                    .to_string(),
            ));
        }

        if self.output.csv_file.trim().is_empty() {
            return Err(ConfigError::Invalid("output.csv_file is empty".to_string()));
        }

        Ok(())
    }

    /// Sample configuration written by `init-config`
    pub fn sample() -> Self {
        let mut model_dict = IndexMap::new();
        model_dict.insert("qwen2-7b-instruct".to_string(), PathBuf::from("results/qwen2-7b-instruct"));
        model_dict.insert("glm4-9b-chat".to_string(), PathBuf::from("results/glm4-9b-chat"));

        Self {
            bge_path: "http://127.0.0.1:8080".to_string(),
            model_dict,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bge_path: String::new(),
            model_dict: IndexMap::new(),
            embedding: EmbeddingConfig::default(),
            output: OutputConfig::default(),
            tasks: Vec::new(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Task registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("No configuration file found (looked for {0})")]
    NotFound(String),
}
