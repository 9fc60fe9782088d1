//! 各抽取策略的提示词

use crate::models::ExtractionStrategy;
use crate::services::extractor::ExtractionRequest;

const SYSTEM_PROMPT: &str = "你是一个专业的试卷结构化助手，负责把 OCR 识别出的试卷文本整理成结构化数据。\
                             必须逐字保留原文，不要总结、改写或省略任何内容。\
                             只输出要求的内容，不要输出解释。";

const QUESTION_SCHEMA: &str = r#"{
  "questionNumber": 1,
  "theme": "题目主题",
  "context": {
    "title": "材料标题",
    "background": "完整的材料原文",
    "diagrams": [
      { "id": "d1", "kind": "diagram-markup | table-markup | other", "content": "图表内容（mermaid 或 markdown 表格）", "label": "图1" }
    ]
  },
  "subQuestions": [
    { "label": "(1)", "text": "小题原文", "point": null, "children": null }
  ]
}"#;

/// 构建 (system_message, user_message)
pub fn build_messages(request: &ExtractionRequest) -> (String, String) {
    let user = match request.strategy {
        ExtractionStrategy::WholeDocumentFast | ExtractionStrategy::WholeDocumentAccurate => {
            whole_document_prompt(&request.source_text)
        }
        ExtractionStrategy::AtomicBackground => background_prompt(&request.source_text),
        ExtractionStrategy::AtomicDiagrams => diagrams_prompt(&request.source_text),
        ExtractionStrategy::AtomicLabelDiscovery => labels_prompt(&request.source_text),
        ExtractionStrategy::AtomicSubQuestion => sub_question_prompt(
            &request.source_text,
            request.label.as_deref().unwrap_or_default(),
        ),
    };
    (SYSTEM_PROMPT.to_string(), user)
}

fn whole_document_prompt(text: &str) -> String {
    format!(
        r#"把下面的试卷文本整理成 JSON 数组，每道大题一个对象，格式如下：
{}

【要求】
- background 必须是材料原文，不能为空；没有材料的题目省略 context
- 小题按原文顺序排列，point 未知时写 null
- 字符串中的双引号必须转义，换行写成 \n
- 只输出 JSON，不要输出其他内容

试卷文本：
{}"#,
        QUESTION_SCHEMA, text
    )
}

fn background_prompt(text: &str) -> String {
    format!(
        r#"只输出下面这道题的材料（背景叙述）原文，纯文本，不要任何 JSON 或 Markdown 包装。
不要包含小题和图表内容。

题目文本：
{}"#,
        text
    )
}

fn diagrams_prompt(text: &str) -> String {
    format!(
        r#"只输出下面这道题中的图表列表，JSON 数组，每个元素格式为：
{{ "id": "d1", "kind": "diagram-markup | table-markup | other", "content": "图表内容", "label": "图1" }}
没有图表时输出 []。

题目文本：
{}"#,
        text
    )
}

fn labels_prompt(text: &str) -> String {
    format!(
        r#"只输出下面这道题中所有小题的标签，按原文顺序组成 JSON 字符串数组，例如 ["(1)", "(2)"]。

题目文本：
{}"#,
        text
    )
}

fn sub_question_prompt(text: &str, label: &str) -> String {
    format!(
        r#"只输出下面这道题中标签为 {} 的小题，JSON 对象格式：
{{ "label": "{}", "text": "小题原文", "point": null, "children": null }}
小题还有下级小题时放在 children 中。

题目文本：
{}"#,
        label, label, text
    )
}
