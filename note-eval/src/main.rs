//! Note evaluation CLI

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use tracing_subscriber::EnvFilter;

use note_eval::{
    analysis::Scorer,
    config::{Config, ConfigError},
    embedding::{create_embedder, verify_embedder, Embedder, HashedNgramEmbedder},
    reporting::{print_console_report, JsonSummary, ScoreTable},
    runner::{ConsoleProgress, Evaluator},
    tasks::{load_dataset, MetricKind, TaskDefinition, TaskRegistry},
};

/// Exit status when configuration is unusable
const EXIT_CONFIG: i32 = 1;
/// Exit status when at least one model could not be evaluated
const EXIT_MODEL_FAILED: i32 = 2;

#[derive(Parser)]
#[command(name = "note-eval")]
#[command(about = "Score model outputs on note-understanding tasks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every configured model on every task (default)
    Run {
        /// Output directory for the score table and summary
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Comma-separated model ids (default: all in model_dict)
        #[arg(short, long)]
        models: Option<String>,

        /// Comma-separated task ids (default: whole registry)
        #[arg(short, long)]
        tasks: Option<String>,
    },

    /// Score a single dataset file with one metric
    Score {
        /// Path to a data.json file
        #[arg(short, long)]
        data: PathBuf,

        /// Metric name, e.g. exact_containment or calculate_ocr_metrics
        #[arg(short, long)]
        metric: MetricKind,

        /// Print the ROUGE/BLEU/semantic breakdown of the composite metric
        #[arg(long)]
        detailed: bool,
    },

    /// List the active task registry
    ListTasks,

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("note_eval=debug,info")
    } else {
        EnvFilter::new("note_eval=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command.unwrap_or(Commands::Run {
        output: None,
        models: None,
        tasks: None,
    }) {
        Commands::Run {
            output,
            models,
            tasks,
        } => {
            let complete = run_evaluation(config_path, output, models, tasks).await?;
            if !complete {
                std::process::exit(EXIT_MODEL_FAILED);
            }
        }

        Commands::Score {
            data,
            metric,
            detailed,
        } => {
            score_file(config_path, &data, metric, detailed).await?;
        }

        Commands::ListTasks => {
            list_tasks(config_path)?;
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

/// Print a configuration error and stop before any scoring
fn config_failure(err: impl std::fmt::Display) -> ! {
    eprintln!("Configuration error: {}", err);
    std::process::exit(EXIT_CONFIG);
}

/// Build the configured embedder and check that it answers
async fn connect_embedder(config: &Config) -> Arc<dyn Embedder> {
    let embedder = create_embedder(config).unwrap_or_else(|e| config_failure(e));
    if let Err(e) = verify_embedder(embedder.as_ref()).await {
        config_failure(format!(
            "embedding backend {} at {:?} is unusable: {}",
            embedder.name(),
            config.bge_path,
            e
        ));
    }
    embedder
}

fn split_list(arg: &str) -> Vec<&str> {
    arg.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Narrow `model_dict` to the requested ids, keeping configuration order
fn select_models(
    all: &IndexMap<String, PathBuf>,
    requested: Option<&str>,
) -> Result<IndexMap<String, PathBuf>, ConfigError> {
    let Some(requested) = requested else {
        return Ok(all.clone());
    };

    let ids = split_list(requested);
    if let Some(unknown) = ids.iter().find(|id| !all.contains_key(**id)) {
        return Err(ConfigError::Invalid(format!("unknown model: {}", unknown)));
    }

    Ok(all
        .iter()
        .filter(|(id, _)| ids.contains(&id.as_str()))
        .map(|(id, path)| (id.clone(), path.clone()))
        .collect())
}

async fn run_evaluation(
    config_path: Option<&Path>,
    output_dir: Option<PathBuf>,
    models_arg: Option<String>,
    tasks_arg: Option<String>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let started_at = Utc::now();
    let run_id = started_at.format("%Y%m%d-%H%M%S").to_string();

    println!("=== Note Evaluation ===");
    println!("Run ID: {}", run_id);

    let (mut config, source) = Config::discover(config_path).unwrap_or_else(|e| config_failure(e));
    println!("Config: {}", source.display());

    let mut registry = config.registry().unwrap_or_else(|e| config_failure(e));
    if let Some(tasks) = tasks_arg.as_deref() {
        registry = registry
            .retain_ids(&split_list(tasks))
            .unwrap_or_else(|e| config_failure(e));
    }
    config.model_dict = select_models(&config.model_dict, models_arg.as_deref())
        .unwrap_or_else(|e| config_failure(e));
    if let Some(dir) = output_dir {
        config.output.output_dir = dir;
    }
    config.validate(&registry).unwrap_or_else(|e| config_failure(e));

    // Only build a remote client when some task will use it
    let embedder: Arc<dyn Embedder> = if registry.requires_embeddings() {
        connect_embedder(&config).await
    } else {
        Arc::new(HashedNgramEmbedder::new(config.embedding.dimensions))
    };

    let model_ids: Vec<&str> = config.model_dict.keys().map(String::as_str).collect();
    println!("Models: {}", model_ids.join(", "));
    println!("Tasks: {}", registry.len());
    println!();

    let evaluator = Evaluator::new(registry.clone(), Scorer::new(embedder))
        .with_progress(Arc::new(ConsoleProgress));

    println!("Running evaluation...");
    let run = evaluator.run(&config.model_dict).await;

    let csv_path = config.output.csv_path();
    let table = ScoreTable::from_run(&run, &registry);
    table.write_to_file(&csv_path)?;
    println!("\nScore table written to: {}", csv_path.display());

    if config.output.write_summary {
        let summary_path = config.output.summary_path();
        let summary = JsonSummary::from_run(
            &run_id,
            started_at,
            &run,
            &registry,
            csv_path.display().to_string(),
        );
        summary.write_to_file(&summary_path)?;
        println!("Summary written to: {}", summary_path.display());
    }

    print_console_report(&run, &registry);

    Ok(run.is_complete())
}

async fn score_file(
    config_path: Option<&Path>,
    data: &Path,
    metric: MetricKind,
    detailed: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let breakdown = detailed && metric == MetricKind::TaxonomyOcrComposite;
    if detailed && !breakdown {
        tracing::warn!("--detailed only applies to taxonomy_ocr_composite");
    }

    let embedder: Arc<dyn Embedder> = if metric.requires_embeddings() {
        let (config, _) = Config::discover(config_path).unwrap_or_else(|e| config_failure(e));
        connect_embedder(&config).await
    } else {
        Arc::new(HashedNgramEmbedder::default())
    };

    let records = load_dataset(data)?;
    // Scores a loose file, not a dataset under a model directory
    let task = TaskDefinition::new(metric.as_str(), String::new(), metric);
    let registry = TaskRegistry::from_definitions(vec![task.clone()])?;
    let evaluator = Evaluator::new(registry, Scorer::new(embedder));

    let (outcome, quality) = if breakdown {
        let (outcome, quality) = evaluator.text_quality_dataset("-", &task, &records).await?;
        (outcome, Some(quality))
    } else {
        (evaluator.score_dataset("-", &task, &records).await?, None)
    };

    println!("File:    {}", data.display());
    println!("Metric:  {}", metric);
    println!("Records: {} ({} unscored)", outcome.records, outcome.failed_records);
    println!("Score:   {:.6}", outcome.score);

    if let Some(quality) = quality {
        println!("{:-<40}", "");
        for component in quality.to_breakdown() {
            println!("  {:<20} {:.6}", component.metric, component.value);
        }
    }

    Ok(())
}

fn list_tasks(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let registry = match Config::discover(config_path) {
        Ok((config, _)) => config.registry()?,
        Err(ConfigError::NotFound(_)) => TaskRegistry::default_registry(),
        Err(e) => config_failure(e),
    };

    println!("Registered Tasks ({}):", registry.len());
    println!("{:-<60}", "");

    for task in registry.iter() {
        let marker = if task.metric.requires_embeddings() { " [embeddings]" } else { "" };
        println!("  {} | {} | {}{}", task.id, task.dataset_path, task.metric, marker);
    }

    Ok(())
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::sample();

    // Ensure parent directory exists
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    config.save_toml(&output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
