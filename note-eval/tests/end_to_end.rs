//! Library-level evaluation runs over on-disk result directories.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{json, Value};
use tempfile::TempDir;

use note_eval::embedding::{RetryPolicy, TeiEmbedder};
use note_eval::prelude::*;
use note_eval::reporting::TOTAL_ROW;

fn record(reference: &str, prediction: &str) -> Value {
    json!({
        "conversations": [
            {"from": "human", "value": "请判断这篇笔记作者的性别"},
            {"from": "gpt", "value": reference}
        ],
        "model_result": prediction
    })
}

fn write_dataset(model_base: &Path, task: &str, records: &[Value]) {
    let dir = model_base.join(task);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("data.json"), serde_json::to_string_pretty(records).unwrap()).unwrap();
}

fn gender_registry() -> TaskRegistry {
    TaskRegistry::from_definitions(vec![TaskDefinition::new(
        "note_gender",
        "note_gender",
        MetricKind::ExactContainment,
    )])
    .unwrap()
}

fn evaluator(registry: TaskRegistry) -> Evaluator {
    Evaluator::new(registry, Scorer::new(Arc::new(HashedNgramEmbedder::default())))
}

#[tokio::test]
async fn two_models_land_at_the_right_coordinates() {
    let root = TempDir::new().unwrap();
    let model_a = root.path().join("model-a");
    let model_b = root.path().join("model-b");
    write_dataset(&model_a, "note_gender", &[record("男", "男"), record("女", "女")]);
    write_dataset(&model_b, "note_gender", &[record("男", "男"), record("女", "男")]);

    let mut models = IndexMap::new();
    models.insert("model-a".to_string(), model_a);
    models.insert("model-b".to_string(), model_b);

    let registry = gender_registry();
    let run = evaluator(registry.clone()).run(&models).await;
    assert!(run.is_complete());

    let table = ScoreTable::from_run(&run, &registry);
    assert_eq!(table.get("model-a", "note_gender"), Some(1.0));
    assert_eq!(table.get("model-a", TOTAL_ROW), Some(1.0));
    assert_eq!(table.get("model-b", "note_gender"), Some(0.5));
    assert_eq!(table.get("model-b", TOTAL_ROW), Some(0.5));

    let csv = table.to_csv_string().unwrap();
    assert_eq!(
        csv,
        ",model-a,model-b\nnote_gender,1.0,0.5\ntotal_score,1.0,0.5\n"
    );
}

#[tokio::test]
async fn missing_dataset_fails_the_model_not_the_run() {
    let root = TempDir::new().unwrap();
    let present = root.path().join("present");
    write_dataset(&present, "note_gender", &[record("男", "男")]);

    let mut models = IndexMap::new();
    models.insert("absent".to_string(), root.path().join("absent"));
    models.insert("present".to_string(), present);

    let registry = gender_registry();
    let run = evaluator(registry.clone()).run(&models).await;

    assert_eq!(run.failures.len(), 1);
    assert_eq!(run.failures[0].model_id, "absent");
    assert!(run.failures[0].error.contains("note_gender"));

    let table = ScoreTable::from_run(&run, &registry);
    assert_eq!(table.models().collect::<Vec<_>>(), vec!["present"]);
}

#[tokio::test]
async fn empty_dataset_is_a_model_failure_not_nan() {
    let root = TempDir::new().unwrap();
    let model = root.path().join("m");
    write_dataset(&model, "note_gender", &[]);

    let mut models = IndexMap::new();
    models.insert("m".to_string(), model);

    let run = evaluator(gender_registry()).run(&models).await;
    assert!(run.models.is_empty());
    assert!(run.failures[0].error.contains("no records"));
}

#[tokio::test]
async fn malformed_record_scores_zero_and_is_counted() {
    let root = TempDir::new().unwrap();
    let model = root.path().join("m");
    write_dataset(
        &model,
        "note_gender",
        &[record("男", "男"), json!({"conversations": [], "model_result": "男"})],
    );

    let mut models = IndexMap::new();
    models.insert("m".to_string(), model);

    let run = evaluator(gender_registry()).run(&models).await;
    let scores = &run.models["m"];
    assert_eq!(scores.score("note_gender"), Some(0.5));
    assert_eq!(scores.failed_records(), 1);
}

#[tokio::test]
async fn mixed_metrics_average_into_total() {
    let registry = TaskRegistry::from_definitions(vec![
        TaskDefinition::new("note_hashtag_multi", "note_hashtag_multi", MetricKind::MultiLabelF1),
        TaskDefinition::new("note_taxonomy_one_level", "note_taxonomy_one_level", MetricKind::TokenPartial3),
        TaskDefinition::new("note_mrc", "note_mrc", MetricKind::SemanticSimilarity),
    ])
    .unwrap();

    let root = TempDir::new().unwrap();
    let model = root.path().join("m");
    write_dataset(&model, "note_hashtag_multi", &[record("#穿搭 #夏日", "#穿搭 #夏日")]);
    write_dataset(&model, "note_taxonomy_one_level", &[record("a b", "a b c d")]);
    write_dataset(&model, "note_mrc", &[record("", "non-empty answer")]);

    let mut models = IndexMap::new();
    models.insert("m".to_string(), model);

    let run = evaluator(registry).run(&models).await;
    let scores = &run.models["m"];
    assert_eq!(scores.score("note_hashtag_multi"), Some(1.0));
    assert_eq!(scores.score("note_taxonomy_one_level"), Some(0.0));
    assert_eq!(scores.score("note_mrc"), Some(0.0));
    assert!((scores.total_score - 1.0 / 3.0).abs() < 1e-12);
}

#[tokio::test]
async fn unreachable_embedding_server_fails_the_model() {
    let registry = TaskRegistry::from_definitions(vec![
        TaskDefinition::new("note_gender", "note_gender", MetricKind::ExactContainment),
        TaskDefinition::new("note_mrc", "note_mrc", MetricKind::SemanticSimilarity),
    ])
    .unwrap();

    let root = TempDir::new().unwrap();
    let model = root.path().join("m");
    write_dataset(&model, "note_gender", &[record("男", "男")]);
    write_dataset(&model, "note_mrc", &[record("夏季防晒", "夏季防晒"), record("通勤穿搭", "通勤穿搭")]);

    let mut models = IndexMap::new();
    models.insert("m".to_string(), model);

    let embedder = TeiEmbedder::new("http://127.0.0.1:9").with_retry(RetryPolicy::none());
    let run = Evaluator::new(registry.clone(), Scorer::new(Arc::new(embedder)))
        .run(&models)
        .await;

    assert!(!run.is_complete());
    assert!(run.models.is_empty());
    assert_eq!(run.failures.len(), 1);
    assert_eq!(run.failures[0].model_id, "m");
    assert_eq!(run.failures[0].task_id, "note_mrc");

    let table = ScoreTable::from_run(&run, &registry);
    assert_eq!(table.get("m", TOTAL_ROW), None);
}

#[test]
fn config_file_drives_registry_and_model_order() {
    let toml = r#"
bge_path = ""

[model_dict]
zeta = "/results/zeta"
alpha = "/results/alpha"

[embedding]
backend = "hashed"

[[tasks]]
id = "note_gender"
metric = "calculate_answer_accuracy"
"#;
    let config = Config::from_toml(toml).unwrap();
    assert_eq!(config.model_dict.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);

    let registry = config.registry().unwrap();
    assert_eq!(registry.ids(), vec!["note_gender"]);
    assert_eq!(registry.get("note_gender").unwrap().metric, MetricKind::ExactContainment);
    config.validate(&registry).unwrap();
}
