//! 抽取后端 - 业务能力层
//!
//! 流程层只依赖 `ExtractionBackend` 这个能力接口，生产环境使用 [`LlmExtractor`]，
//! 测试中使用按策略预置响应的 [`MockBackend`]。
//!
//! [`LlmExtractor`]: crate::services::LlmExtractor

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ExtractionError;
use crate::models::ExtractionStrategy;

/// 一次抽取调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub strategy: ExtractionStrategy,
    pub document_id: String,
    /// 原子策略针对的题号
    pub question_number: Option<i64>,
    /// `AtomicSubQuestion` 针对的小题标签
    pub label: Option<String>,
    /// 送给抽取服务的源文本
    pub source_text: String,
}

impl ExtractionRequest {
    pub fn whole_document(
        strategy: ExtractionStrategy,
        document_id: impl Into<String>,
        source_text: impl Into<String>,
    ) -> Self {
        Self {
            strategy,
            document_id: document_id.into(),
            question_number: None,
            label: None,
            source_text: source_text.into(),
        }
    }

    pub fn atomic(
        strategy: ExtractionStrategy,
        document_id: impl Into<String>,
        question_number: i64,
        source_text: impl Into<String>,
    ) -> Self {
        Self {
            strategy,
            document_id: document_id.into(),
            question_number: Some(question_number),
            label: None,
            source_text: source_text.into(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// 抽取能力：返回未解析的原始文本
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    async fn extract(&self, request: &ExtractionRequest) -> Result<String, ExtractionError>;
}

type ScriptKey = (Option<String>, ExtractionStrategy);
type Scripted = Result<String, ExtractionError>;

/// 预置响应的后端
///
/// 查找顺序：文档专属队列 → 文档专属默认值 → 通用队列 → 通用默认值。
/// 都没有时返回 `Fatal`。所有请求都会被记录。
#[derive(Clone, Default)]
pub struct MockBackend {
    queues: Arc<Mutex<HashMap<ScriptKey, VecDeque<Scripted>>>>,
    defaults: Arc<Mutex<HashMap<ScriptKey, Scripted>>>,
    calls: Arc<Mutex<Vec<ExtractionRequest>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个一次性响应
    pub fn push(&self, strategy: ExtractionStrategy, response: Scripted) -> &Self {
        self.queues
            .lock()
            .entry((None, strategy))
            .or_default()
            .push_back(response);
        self
    }

    /// 追加一个只对某个文档生效的一次性响应
    pub fn push_for(
        &self,
        document_id: &str,
        strategy: ExtractionStrategy,
        response: Scripted,
    ) -> &Self {
        self.queues
            .lock()
            .entry((Some(document_id.to_string()), strategy))
            .or_default()
            .push_back(response);
        self
    }

    /// 设置队列为空时的默认响应
    pub fn set_default(&self, strategy: ExtractionStrategy, response: Scripted) -> &Self {
        self.defaults.lock().insert((None, strategy), response);
        self
    }

    /// 设置某个文档的默认响应
    pub fn set_default_for(
        &self,
        document_id: &str,
        strategy: ExtractionStrategy,
        response: Scripted,
    ) -> &Self {
        self.defaults
            .lock()
            .insert((Some(document_id.to_string()), strategy), response);
        self
    }

    pub fn calls(&self) -> Vec<ExtractionRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, strategy: ExtractionStrategy) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.strategy == strategy)
            .count()
    }

    fn next_response(&self, request: &ExtractionRequest) -> Option<Scripted> {
        let doc_key = (Some(request.document_id.clone()), request.strategy);
        let any_key = (None, request.strategy);

        let mut queues = self.queues.lock();
        if let Some(response) = queues.get_mut(&doc_key).and_then(VecDeque::pop_front) {
            return Some(response);
        }
        let defaults = self.defaults.lock();
        if let Some(response) = defaults.get(&doc_key) {
            return Some(response.clone());
        }
        if let Some(response) = queues.get_mut(&any_key).and_then(VecDeque::pop_front) {
            return Some(response);
        }
        defaults.get(&any_key).cloned()
    }
}

#[async_trait]
impl ExtractionBackend for MockBackend {
    async fn extract(&self, request: &ExtractionRequest) -> Result<String, ExtractionError> {
        self.calls.lock().push(request.clone());
        self.next_response(request).unwrap_or_else(|| {
            Err(ExtractionError::fatal(
                request.strategy,
                "没有可用的预置响应",
            ))
        })
    }
}
