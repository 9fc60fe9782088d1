//! 结构化题目记录
//!
//! 一道大题（`StructuredQuestion`）包含可选的材料（`Context`）和有序的小题列表。
//! 序列化使用 camelCase；反序列化兼容模型常见的 snake_case 写法和字符串形式的数字。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuestion {
    /// 文档内的稳定标识
    #[serde(alias = "question_number", alias = "number", deserialize_with = "lenient::integer")]
    pub question_number: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub theme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    #[serde(default, alias = "sub_questions")]
    pub sub_questions: Vec<SubQuestion>,
}

impl StructuredQuestion {
    pub fn new(question_number: i64) -> Self {
        Self {
            question_number,
            theme: String::new(),
            description: None,
            context: None,
            sub_questions: Vec::new(),
        }
    }

    /// 按遍历顺序收集所有叶子小题
    pub fn leaves(&self) -> Vec<&SubQuestion> {
        let mut out = Vec::new();
        for sub in &self.sub_questions {
            sub.collect_leaves(&mut out);
        }
        out
    }

    /// 按遍历顺序收集所有叶子小题（可变）
    pub fn leaves_mut(&mut self) -> Vec<&mut SubQuestion> {
        let mut out = Vec::new();
        for sub in &mut self.sub_questions {
            sub.collect_leaves_mut(&mut out);
        }
        out
    }

    pub fn background(&self) -> Option<&str> {
        self.context.as_ref().map(|c| c.background.as_str())
    }
}

/// 大题材料
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub background: String,
    #[serde(default)]
    pub diagrams: Vec<Diagram>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagram {
    /// 在同一个 Context 内唯一
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(alias = "type", default)]
    pub kind: DiagramKind,
    #[serde(default, deserialize_with = "lenient::string")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub label: String,
}

/// 图表类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DiagramKind {
    DiagramMarkup,
    TableMarkup,
    #[default]
    Other,
}

impl DiagramKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagramKind::DiagramMarkup => "diagram-markup",
            DiagramKind::TableMarkup => "table-markup",
            DiagramKind::Other => "other",
        }
    }
}

impl From<String> for DiagramKind {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "diagram-markup" | "diagram" | "mermaid" => DiagramKind::DiagramMarkup,
            "table-markup" | "table" | "markdown-table" => DiagramKind::TableMarkup,
            _ => DiagramKind::Other,
        }
    }
}

impl From<DiagramKind> for String {
    fn from(kind: DiagramKind) -> Self {
        kind.as_str().to_string()
    }
}

/// 小题
///
/// 没有子节点的小题是叶子，分值只分配给叶子。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubQuestion {
    #[serde(default, deserialize_with = "lenient::string")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub text: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_integer"
    )]
    pub point: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SubQuestion>>,
}

impl SubQuestion {
    pub fn leaf(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
            point: None,
            children: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.as_ref().map_or(true, |c| c.is_empty())
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a SubQuestion>) {
        match &self.children {
            Some(children) if !children.is_empty() => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
            _ => out.push(self),
        }
    }

    fn collect_leaves_mut<'a>(&'a mut self, out: &mut Vec<&'a mut SubQuestion>) {
        if self.is_leaf() {
            out.push(self);
            return;
        }
        if let Some(children) = self.children.as_mut() {
            for child in children {
                child.collect_leaves_mut(out);
            }
        }
    }
}

/// 宽松的反序列化辅助：模型经常把数字写成字符串，或者把字符串写成 null
mod lenient {
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;

    struct IntegerVisitor;

    impl<'de> Visitor<'de> for IntegerVisitor {
        type Value = i64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an integer or a numeric string")
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<i64, E> {
            Ok(value)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<i64, E> {
            i64::try_from(value).map_err(E::custom)
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<i64, E> {
            if value.fract() == 0.0 {
                Ok(value as i64)
            } else {
                Err(E::custom(format!("not an integer: {}", value)))
            }
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<i64, E> {
            value
                .trim()
                .parse::<i64>()
                .map_err(|_| E::custom(format!("not an integer: {:?}", value)))
        }
    }

    pub fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        deserializer.deserialize_any(IntegerVisitor)
    }

    struct OptionalIntegerVisitor;

    impl<'de> Visitor<'de> for OptionalIntegerVisitor {
        type Value = Option<i64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an integer, a numeric string or null")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            integer(d).map(Some)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            IntegerVisitor.visit_i64(value).map(Some)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            IntegerVisitor.visit_u64(value).map(Some)
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
            IntegerVisitor.visit_f64(value).map(Some)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            if value.trim().is_empty() {
                return Ok(None);
            }
            IntegerVisitor.visit_str(value).map(Some)
        }
    }

    pub fn optional_integer<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        deserializer.deserialize_any(OptionalIntegerVisitor)
    }

    struct StringVisitor;

    impl<'de> Visitor<'de> for StringVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, a number or null")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_string<E: de::Error>(self, value: String) -> Result<String, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_none<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        deserializer.deserialize_any(StringVisitor)
    }
}

pub(crate) use lenient::{integer as lenient_integer, string as lenient_string};
