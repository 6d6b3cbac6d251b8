//! Offline evaluation of language-model outputs on note-understanding tasks
//!
//! Each configured model has a directory of per-task result files. This crate
//! scores every record of every task with the task's metric, averages the
//! record scores into per-task scores, and averages those into a per-model
//! `total_score`.
//!
//! # Features
//!
//! - 12 built-in tasks, replaceable from configuration
//! - Containment, three-level taxonomy, multi-label F1, embedding similarity
//!   and ROUGE/BLEU/embedding composite metrics
//! - Embeddings from a text-embeddings-inference or OpenAI-compatible server,
//!   or an offline hashed backend
//! - CSV score table and JSON run summary
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use note_eval::{
//!     analysis::Scorer,
//!     config::Config,
//!     embedding::create_embedder,
//!     reporting::ScoreTable,
//!     runner::Evaluator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (config, _) = Config::discover(None)?;
//!     let registry = config.registry()?;
//!     config.validate(&registry)?;
//!
//!     let scorer = Scorer::new(create_embedder(&config)?);
//!     let evaluator = Evaluator::new(registry.clone(), scorer);
//!     let run = evaluator.run(&config.model_dict).await;
//!
//!     ScoreTable::from_run(&run, &registry).write_to_file(config.output.csv_path())?;
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod embedding;
pub mod reporting;
pub mod runner;
pub mod tasks;

pub use config::Config;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::analysis::{RecordScoringError, Scorer, TextQuality};
    pub use crate::config::{Config, ConfigError, EmbeddingBackend};
    pub use crate::embedding::{create_embedder, Embedder, EmbeddingError, HashedNgramEmbedder};
    pub use crate::reporting::{print_console_report, JsonSummary, ScoreTable};
    pub use crate::runner::{ConsoleProgress, EvalError, EvaluationRun, Evaluator, NoOpProgress};
    pub use crate::tasks::{EvaluationRecord, MetricKind, TaskDefinition, TaskRegistry};
}
