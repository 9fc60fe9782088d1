//! 上游 OCR/抽取服务交给流水线的原始数据
//!
//! 一份原始文档是一组松散的题目对象，至少包含题号和文本，选择题可能带选项。

use serde::{Deserialize, Serialize};

use super::question::{lenient_integer, lenient_string};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDocument {
    /// 文档标识（文件名去掉扩展名），加载时设置
    #[serde(skip)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_year", skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default)]
    pub questions: Vec<RawQuestion>,
    /// 来源文件路径
    #[serde(skip)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawQuestion {
    #[serde(
        alias = "questionNumber",
        alias = "question_number",
        deserialize_with = "lenient_integer"
    )]
    pub number: i64,
    #[serde(default, alias = "stem", alias = "content", deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl RawDocument {
    /// 用于日志和输出文件名的展示名称
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// 按首次出现顺序返回去重后的题号
    pub fn question_numbers(&self) -> Vec<i64> {
        let mut numbers = Vec::new();
        for q in &self.questions {
            if !numbers.contains(&q.number) {
                numbers.push(q.number);
            }
        }
        numbers
    }

    /// 整份文档渲染为纯文本
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(name) = &self.name {
            out.push_str(name);
            out.push_str("\n\n");
        }
        for q in &self.questions {
            out.push_str(&q.render());
            out.push('\n');
        }
        out
    }

    /// 只渲染某个题号的内容（一道题可能被上游拆成多个对象）
    pub fn question_text(&self, number: i64) -> String {
        self.questions
            .iter()
            .filter(|q| q.number == number)
            .map(RawQuestion::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 某个题号的主题：优先取题目上的 theme，其次取文档名
    pub fn theme_for(&self, number: i64) -> String {
        self.questions
            .iter()
            .filter(|q| q.number == number)
            .find_map(|q| q.theme.clone().filter(|t| !t.trim().is_empty()))
            .or_else(|| self.name.clone())
            .unwrap_or_default()
    }
}

impl RawQuestion {
    pub fn render(&self) -> String {
        let mut out = format!("第{}题\n{}\n", self.number, self.text.trim());
        for (i, option) in self.options.iter().enumerate() {
            let letter = (b'A' + (i % 26) as u8) as char;
            out.push_str(&format!("{}. {}\n", letter, option.trim()));
        }
        out
    }
}

// 年份可能是字符串也可能是整数
fn deserialize_year<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct YearVisitor;

    impl<'de> Visitor<'de> for YearVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer representing a year")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(YearVisitor)
}
