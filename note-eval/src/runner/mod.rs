//! Evaluation orchestrator

pub mod executor;

pub use executor::{
    mean, ConsoleProgress, EvalError, EvaluationRun, Evaluator, ModelFailure, ModelScores,
    NoOpProgress, ProgressCallback, TaskOutcome,
};
