use std::fs;
use std::path::Path;
use std::sync::Arc;

use exam_structure::config::{Config, FailurePolicy};
use exam_structure::error::ExtractionError;
use exam_structure::models::{ExtractionStrategy, StructuredQuestion};
use exam_structure::orchestrator::{App, BatchOptions, BatchStats};
use exam_structure::services::MockBackend;
use tempfile::TempDir;

use ExtractionStrategy::*;

const WHOLE_OK: &str = r#"```json
[
  {
    "questionNumber": 1,
    "theme": "气候",
    "context": {
      "title": "材料一",
      "background": "某地区年降水量较少，蒸发旺盛。",
      "diagrams": [{"id": "d1", "kind": "table-markup", "content": "|月份|降水|", "label": "表1"}]
    },
    "subQuestions": [
      {"label": "(1)", "text": "说明该地区的气候特征。"},
      {"label": "(2)", "text": "分析蒸发旺盛的原因。"},
      {"label": "(3)", "text": "提出一条合理建议。"}
    ]
  }
]
```"#;

fn test_config(dir: &TempDir) -> Config {
    let root = dir.path();
    Config {
        input_folder: root.join("raw").to_string_lossy().into_owned(),
        output_folder: root.join("structured").to_string_lossy().into_owned(),
        diagnostic_folder: root.join("failed").to_string_lossy().into_owned(),
        output_log_file: root.join("output.txt").to_string_lossy().into_owned(),
        max_concurrent_documents: 1,
        inter_call_delay_ms: 0,
        rate_limit_base_delay_secs: 0,
        rate_limit_max_delay_secs: 0,
        rate_limit_max_retries: 1,
        ..Config::default()
    }
}

fn write_raw(config: &Config, id: &str) {
    let folder = Path::new(&config.input_folder);
    fs::create_dir_all(folder).unwrap();
    let body = r#"{
  "name": "地理试卷",
  "year": 2023,
  "questions": [
    {"number": 1, "text": "阅读材料，完成下列要求。某地区年降水量较少，蒸发旺盛。(1) 说明气候特征。(2) 分析原因。"}
  ]
}"#;
    fs::write(folder.join(format!("{}.json", id)), body).unwrap();
}

fn read_output(config: &Config, id: &str) -> Vec<StructuredQuestion> {
    let path = Path::new(&config.output_folder).join(format!("{}.json", id));
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn diagnostic_path(config: &Config, id: &str) -> std::path::PathBuf {
    Path::new(&config.diagnostic_folder).join(format!("{}.failed.txt", id))
}

fn all() -> BatchOptions {
    BatchOptions {
        all: true,
        ..Default::default()
    }
}

/// 整卷抽取失败后进入原子分解的脚本
fn atomic_script(mock: &MockBackend) {
    mock.set_default(WholeDocumentFast, Err(ExtractionError::fatal(WholeDocumentFast, "down")))
        .set_default(WholeDocumentAccurate, Ok("[{\"questionNumber\": 1, ".into()))
        .set_default(AtomicBackground, Ok("某地区年降水量较少，蒸发旺盛。".into()))
        .set_default(AtomicDiagrams, Ok(r#"[{"id": "d1", "kind": "mermaid", "content": "graph TD", "label": "图1"}]"#.into()))
        .set_default(AtomicLabelDiscovery, Ok(r#"["(1)", "(2)"]"#.into()))
        .set_default(AtomicSubQuestion, Ok(r#"{"text": "小题内容"}"#.into()));
}

async fn run(config: Config, mock: &MockBackend, options: &BatchOptions) -> BatchStats {
    let app = App::new(config, Arc::new(mock.clone()));
    app.run(options).await.unwrap()
}

#[tokio::test]
async fn test_whole_document_pipeline_writes_scored_output() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    write_raw(&config, "2023-geo-a");

    let mock = MockBackend::new();
    mock.set_default(WholeDocumentFast, Ok(WHOLE_OK.into()));

    let stats = run(config.clone(), &mock, &all()).await;
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 0);

    let output = read_output(&config, "2023-geo-a");
    assert_eq!(output.len(), 1);
    let points: Vec<i64> = output[0].leaves().iter().map(|l| l.point.unwrap()).collect();
    assert_eq!(points, vec![34, 33, 33]);
    assert_eq!(mock.call_count(WholeDocumentAccurate), 0);
}

#[tokio::test]
async fn test_fast_failure_falls_back_to_accurate() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    write_raw(&config, "doc");

    let mock = MockBackend::new();
    mock.set_default(WholeDocumentFast, Ok("这不是 JSON".into()))
        .set_default(WholeDocumentAccurate, Ok(WHOLE_OK.into()));

    let stats = run(config.clone(), &mock, &all()).await;
    assert_eq!(stats.succeeded, 1);
    assert_eq!(read_output(&config, "doc")[0].theme, "气候");
    assert_eq!(mock.call_count(AtomicBackground), 0);
}

#[tokio::test]
async fn test_background_failure_writes_diagnostic_and_no_output() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    write_raw(&config, "doc");

    let mock = MockBackend::new();
    atomic_script(&mock);
    mock.set_default(AtomicBackground, Err(ExtractionError::retryable(AtomicBackground, "429")));

    let stats = run(config.clone(), &mock, &all()).await;
    assert_eq!(stats.failed, 1);
    assert_eq!(mock.call_count(AtomicBackground), 2);
    assert_eq!(mock.call_count(AtomicDiagrams), 0);
    assert_eq!(mock.call_count(AtomicSubQuestion), 0);

    assert!(!Path::new(&config.output_folder).join("doc.json").exists());
    let diagnostic = fs::read_to_string(diagnostic_path(&config, "doc")).unwrap();
    assert!(diagnostic.contains("背景抽取"));
    // 整卷精确抽取留下的原始文本
    assert!(diagnostic.contains("[{\"questionNumber\": 1,"));
}

#[tokio::test]
async fn test_diagram_failure_still_produces_record() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    write_raw(&config, "doc");

    let mock = MockBackend::new();
    atomic_script(&mock);
    mock.set_default(AtomicDiagrams, Ok("{\"diagrams\": [".into()));

    let stats = run(config.clone(), &mock, &all()).await;
    assert_eq!(stats.succeeded, 1);

    let output = read_output(&config, "doc");
    let context = output[0].context.as_ref().unwrap();
    assert!(context.diagrams.is_empty());
    assert_eq!(context.background, "某地区年降水量较少，蒸发旺盛。");
    let points: Vec<i64> = output[0].leaves().iter().map(|l| l.point.unwrap()).collect();
    assert_eq!(points, vec![50, 50]);
}

#[tokio::test]
async fn test_existing_output_is_skipped_unless_forced() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    write_raw(&config, "doc");

    let mock = MockBackend::new();
    mock.set_default(WholeDocumentFast, Ok(WHOLE_OK.into()));

    run(config.clone(), &mock, &all()).await;
    let stats = run(config.clone(), &mock, &all()).await;
    assert_eq!(stats.skipped, 1);
    assert_eq!(mock.call_count(WholeDocumentFast), 1);

    let forced = BatchOptions {
        force: true,
        ..all()
    };
    let stats = run(config.clone(), &mock, &forced).await;
    assert_eq!(stats.succeeded, 1);
    assert_eq!(mock.call_count(WholeDocumentFast), 2);
}

#[tokio::test]
async fn test_failure_never_replaces_existing_output() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    write_raw(&config, "doc");

    let good = MockBackend::new();
    good.set_default(WholeDocumentFast, Ok(WHOLE_OK.into()));
    run(config.clone(), &good, &all()).await;
    let before = read_output(&config, "doc");

    let bad = MockBackend::new();
    atomic_script(&bad);
    bad.set_default(AtomicBackground, Ok(String::new()));
    let forced = BatchOptions {
        force: true,
        ..all()
    };
    let stats = run(config.clone(), &bad, &forced).await;

    assert_eq!(stats.failed, 1);
    assert_eq!(read_output(&config, "doc"), before);
    assert!(diagnostic_path(&config, "doc").exists());
}

fn failing_first_document(mock: &MockBackend) {
    mock.set_default(WholeDocumentFast, Ok(WHOLE_OK.into()));
    for strategy in [WholeDocumentFast, WholeDocumentAccurate, AtomicBackground] {
        mock.set_default_for("a", strategy, Err(ExtractionError::fatal(strategy, "down")));
    }
}

#[tokio::test]
async fn test_continue_on_failure_processes_everything() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    for id in ["a", "b", "c"] {
        write_raw(&config, id);
    }

    let mock = MockBackend::new();
    failing_first_document(&mock);

    let stats = run(config, &mock, &all()).await;
    assert_eq!(
        stats,
        BatchStats {
            total: 3,
            succeeded: 2,
            failed: 1,
            skipped: 0,
            not_run: 0,
        }
    );
}

#[tokio::test]
async fn test_stop_on_first_failure_starts_nothing_new() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.failure_policy = FailurePolicy::StopOnFirstFailure;
    for id in ["a", "b", "c"] {
        write_raw(&config, id);
    }

    let mock = MockBackend::new();
    failing_first_document(&mock);

    let stats = run(config.clone(), &mock, &all()).await;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.succeeded, 0);
    assert_eq!(stats.not_run, 2);
    assert!(!Path::new(&config.output_folder).join("b.json").exists());
}

#[tokio::test]
async fn test_stop_on_first_failure_with_parallel_documents() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.failure_policy = FailurePolicy::StopOnFirstFailure;
    config.max_concurrent_documents = 2;
    for id in ["a", "b", "c", "d", "e"] {
        write_raw(&config, id);
    }

    let mock = MockBackend::new();
    failing_first_document(&mock);

    let stats = run(config.clone(), &mock, &all()).await;
    assert_eq!(stats.total, 5);
    assert_eq!(stats.failed, 1);
    assert!(stats.not_run >= 2, "{:?}", stats);
    assert_eq!(stats.succeeded + stats.failed + stats.not_run, 5);

    // 与失败文档同时启动的文档照常完成
    assert!(Path::new(&config.output_folder).join("b.json").exists());

    let started: Vec<String> = mock.calls().into_iter().map(|c| c.document_id).collect();
    assert!(!started.iter().any(|id| id == "d" || id == "e"), "{:?}", started);
    assert!(!Path::new(&config.output_folder).join("e.json").exists());
}

#[tokio::test]
async fn test_target_prefix_selects_documents() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    for id in ["2023-geo", "2023-his", "2024-geo"] {
        write_raw(&config, id);
    }

    let mock = MockBackend::new();
    mock.set_default(WholeDocumentFast, Ok(WHOLE_OK.into()));

    let options = BatchOptions {
        target: Some("2023-".to_string()),
        ..Default::default()
    };
    let stats = run(config.clone(), &mock, &options).await;
    assert_eq!(stats.total, 2);
    assert_eq!(stats.succeeded, 2);
    assert!(!Path::new(&config.output_folder).join("2024-geo.json").exists());
}
