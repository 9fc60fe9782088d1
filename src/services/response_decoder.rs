//! 响应解码 - 业务能力层
//!
//! 把抽取服务返回的原始文本变成结构化数据：去掉代码块包装，交给修复引擎解析，
//! 再按各策略期望的形状反序列化。任何一步失败都是 `Recoverable`，
//! 并带上最后一次的原始文本，供诊断文件使用。

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ExtractionError;
use crate::models::{Diagram, ExtractionStrategy, StructuredQuestion, SubQuestion};
use crate::repair::RepairEngine;

/// 去掉 Markdown 代码块包装、BOM 和首尾空白
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim_start_matches('\u{feff}').trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed.to_string();
    };

    let after_open = &trimmed[start + 3..];
    // 跳过语言标记（```json）
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    let body = match body.rfind("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim().to_string()
}

/// 解析整卷抽取结果：题目数组、`{"questions": [...]}` 或单个题目对象
pub fn decode_questions(
    text: &str,
    engine: &RepairEngine,
    strategy: ExtractionStrategy,
) -> Result<Vec<StructuredQuestion>, ExtractionError> {
    let (value, cleaned) = repair_value(text, engine, strategy)?;
    let value = match value {
        Value::Object(mut map) if map.contains_key("questions") => {
            map.remove("questions").unwrap_or(Value::Null)
        }
        Value::Object(map) => Value::Array(vec![Value::Object(map)]),
        other => other,
    };

    let questions: Vec<StructuredQuestion> = from_value(value, strategy, &cleaned)?;
    if questions.is_empty() {
        return Err(ExtractionError::recoverable(strategy, "没有抽取到任何题目").with_last_text(cleaned));
    }
    Ok(questions)
}

/// 解析背景文本：纯文本，不做结构修复
pub fn decode_background(
    text: &str,
    strategy: ExtractionStrategy,
) -> Result<String, ExtractionError> {
    let background = strip_code_fence(text);
    if background.is_empty() {
        return Err(ExtractionError::recoverable(strategy, "背景为空").with_last_text(text));
    }
    Ok(background)
}

/// 解析图表列表：数组或 `{"diagrams": [...]}`
pub fn decode_diagrams(
    text: &str,
    engine: &RepairEngine,
    strategy: ExtractionStrategy,
) -> Result<Vec<Diagram>, ExtractionError> {
    let (value, cleaned) = repair_value(text, engine, strategy)?;
    let value = unwrap_field(value, "diagrams");
    from_value(value, strategy, &cleaned)
}

/// 解析小题标签列表，去空白、去重，保持顺序
pub fn decode_labels(
    text: &str,
    engine: &RepairEngine,
    strategy: ExtractionStrategy,
) -> Result<Vec<String>, ExtractionError> {
    let (value, cleaned) = repair_value(text, engine, strategy)?;
    let Value::Array(items) = unwrap_field(value, "labels") else {
        return Err(ExtractionError::recoverable(strategy, "标签列表不是数组").with_last_text(cleaned));
    };

    let mut labels: Vec<String> = Vec::new();
    for item in items {
        let label = match item {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            other => {
                debug!("忽略无法识别的标签: {}", other);
                continue;
            }
        };
        if !label.is_empty() && !labels.contains(&label) {
            labels.push(label);
        }
    }

    if labels.is_empty() {
        return Err(ExtractionError::recoverable(strategy, "没有发现任何小题标签").with_last_text(cleaned));
    }
    Ok(labels)
}

/// 解析单个小题，缺失的标签用请求中的标签补上
pub fn decode_sub_question(
    text: &str,
    label: &str,
    engine: &RepairEngine,
    strategy: ExtractionStrategy,
) -> Result<SubQuestion, ExtractionError> {
    let (value, cleaned) = repair_value(text, engine, strategy)?;
    let value = match value {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    };

    let mut sub: SubQuestion = from_value(value, strategy, &cleaned)?;
    if sub.label.trim().is_empty() {
        sub.label = label.to_string();
    }
    if sub.text.trim().is_empty() {
        return Err(
            ExtractionError::recoverable(strategy, format!("小题 {} 内容为空", label))
                .with_last_text(cleaned),
        );
    }
    Ok(sub)
}

fn repair_value(
    text: &str,
    engine: &RepairEngine,
    strategy: ExtractionStrategy,
) -> Result<(Value, String), ExtractionError> {
    let cleaned = strip_code_fence(text);
    match engine.repair(&cleaned) {
        Ok(repaired) => {
            if repaired.transformations > 0 {
                debug!("[{}] 修复了 {} 处结构问题", strategy, repaired.transformations);
            }
            Ok((repaired.value, repaired.text))
        }
        Err(e) => {
            let last_text = e.last_text().to_string();
            Err(ExtractionError::recoverable(strategy, e.to_string()).with_last_text(last_text))
        }
    }
}

fn unwrap_field(value: Value, field: &str) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key(field) => {
            map.remove(field).unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn from_value<T: DeserializeOwned>(
    value: Value,
    strategy: ExtractionStrategy,
    text: &str,
) -> Result<T, ExtractionError> {
    serde_json::from_value(value).map_err(|e| {
        ExtractionError::recoverable(strategy, format!("结构不符合预期: {}", e))
            .with_last_text(text)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiagramKind;

    const WHOLE: ExtractionStrategy = ExtractionStrategy::WholeDocumentFast;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fence("前言\n```\n{}\n```\n后记"), "{}");
        assert_eq!(strip_code_fence("\u{feff}  [] "), "[]");
        assert_eq!(strip_code_fence("```json\n[1]"), "[1]");
    }

    #[test]
    fn test_decode_questions_shapes() {
        let engine = RepairEngine::default();
        let array = r#"[{"questionNumber": 1, "theme": "t", "subQuestions": []}]"#;
        let object = r#"{"questions": [{"question_number": "2"}]}"#;
        let single = r#"{"number": 3, "sub_questions": [{"label": "(1)", "text": "x"}]}"#;

        assert_eq!(decode_questions(array, &engine, WHOLE).unwrap()[0].question_number, 1);
        assert_eq!(decode_questions(object, &engine, WHOLE).unwrap()[0].question_number, 2);
        let q = &decode_questions(single, &engine, WHOLE).unwrap()[0];
        assert_eq!(q.question_number, 3);
        assert_eq!(q.sub_questions.len(), 1);
    }

    #[test]
    fn test_decode_questions_repairs_split_string() {
        let engine = RepairEngine::default();
        let text = "```json\n[{\"questionNumber\": 1, \"context\": {\"background\": \"第一段\n第二段\"}}]\n```";
        let questions = decode_questions(text, &engine, WHOLE).unwrap();
        assert_eq!(questions[0].background(), Some("第一段\n第二段"));
    }

    #[test]
    fn test_decode_questions_empty_is_recoverable() {
        let engine = RepairEngine::default();
        let err = decode_questions("[]", &engine, WHOLE).unwrap_err();
        assert!(matches!(err, ExtractionError::Recoverable { .. }));
        assert_eq!(err.last_text(), Some("[]"));
    }

    #[test]
    fn test_unrepairable_text_keeps_last_text() {
        let engine = RepairEngine::new(3);
        let err = decode_questions("", &engine, WHOLE).unwrap_err();
        assert!(matches!(err, ExtractionError::Recoverable { .. }));
        assert!(err.last_text().is_some());
    }

    #[test]
    fn test_decode_background() {
        let strategy = ExtractionStrategy::AtomicBackground;
        assert_eq!(decode_background("  材料一 \n", strategy).unwrap(), "材料一");
        assert!(decode_background("```\n\n```", strategy).is_err());
    }

    #[test]
    fn test_decode_diagrams() {
        let engine = RepairEngine::default();
        let strategy = ExtractionStrategy::AtomicDiagrams;
        let text = r#"{"diagrams": [{"id": "d1", "type": "mermaid", "content": "graph TD", "label": "图1"}]}"#;
        let diagrams = decode_diagrams(text, &engine, strategy).unwrap();
        assert_eq!(diagrams.len(), 1);
        assert_eq!(diagrams[0].kind, DiagramKind::DiagramMarkup);
        assert!(decode_diagrams("[]", &engine, strategy).unwrap().is_empty());
    }

    #[test]
    fn test_decode_labels_dedupes() {
        let engine = RepairEngine::default();
        let strategy = ExtractionStrategy::AtomicLabelDiscovery;
        let labels = decode_labels(r#"[" (1) ", "(2)", "(1)", 3, null]"#, &engine, strategy).unwrap();
        assert_eq!(labels, vec!["(1)", "(2)", "3"]);
        assert!(decode_labels("[]", &engine, strategy).is_err());
        assert!(decode_labels(r#"{"a": 1}"#, &engine, strategy).is_err());
    }

    #[test]
    fn test_decode_sub_question_fills_label() {
        let engine = RepairEngine::default();
        let strategy = ExtractionStrategy::AtomicSubQuestion;
        let sub = decode_sub_question(r#"{"text": "说明原因"}"#, "(2)", &engine, strategy).unwrap();
        assert_eq!(sub.label, "(2)");
        assert_eq!(sub.text, "说明原因");
        assert!(decode_sub_question(r#"{"label": "(2)", "text": " "}"#, "(2)", &engine, strategy).is_err());
    }
}
