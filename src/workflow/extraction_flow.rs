//! 分层抽取流程 - 流程层
//!
//! 核心职责：定义"一份文档"的抽取流程
//!
//! 流程顺序：
//! 1. WholeDocumentFast → 修复 → 校验
//! 2. WholeDocumentAccurate → 修复 → 校验（第 1 步的输出直接丢弃）
//! 3. 原子分解（按题号）：
//!    - 先为所有题目抽取背景（承重，任一失败整份文档失败）
//!    - 再逐题抽取图表（失败退化为空列表）、发现标签（失败使用默认标签）、
//!      逐个标签抽取小题（失败则省略该小题）
//!
//! 所有调用串行发出，相邻调用之间保持固定间隔。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{DocumentFailure, ExtractionError, FailureStage};
use crate::models::{
    validate_question, Context, Diagram, ExtractionStrategy, RawDocument, StructuredQuestion,
    SubQuestion,
};
use crate::repair::RepairEngine;
use crate::services::response_decoder;
use crate::services::{CallPacer, ExtractionBackend, ExtractionRequest, RateLimitPolicy};
use crate::utils::logging::truncate_text;
use crate::workflow::document_ctx::DocumentCtx;

/// 最终成功的抽取层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionTier {
    WholeDocument(ExtractionStrategy),
    Atomic,
}

impl fmt::Display for ExtractionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionTier::WholeDocument(strategy) => write!(f, "{}", strategy),
            ExtractionTier::Atomic => f.write_str("atomic"),
        }
    }
}

/// 抽取结果：尚未合并的片段
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    pub tier: ExtractionTier,
    pub fragments: Vec<StructuredQuestion>,
}

/// 分层抽取流程
///
/// - 决定何时升级到下一个层级
/// - 区分承重调用和尽力而为的调用
/// - 只依赖抽取能力（`ExtractionBackend`），不接触文件
pub struct ExtractionFlow {
    backend: Arc<dyn ExtractionBackend>,
    engine: RepairEngine,
    rate_limit: RateLimitPolicy,
    inter_call_delay: Duration,
    default_labels: Vec<String>,
}

impl ExtractionFlow {
    /// 创建新的抽取流程
    pub fn new(backend: Arc<dyn ExtractionBackend>, config: &Config) -> Self {
        Self {
            backend,
            engine: RepairEngine::new(config.repair_attempt_budget),
            rate_limit: RateLimitPolicy::from_config(config),
            inter_call_delay: Duration::from_millis(config.inter_call_delay_ms),
            default_labels: config.default_labels.clone(),
        }
    }

    pub async fn run(
        &self,
        document: &RawDocument,
        ctx: &DocumentCtx,
    ) -> Result<FlowOutcome, DocumentFailure> {
        let pacer = CallPacer::new(self.inter_call_delay);
        let source = document.render();
        let mut last_raw_text: Option<String> = None;

        // ========== 层级 1 / 2: 整卷抽取 ==========
        for strategy in ExtractionStrategy::WHOLE_DOCUMENT {
            info!("{} 🔍 尝试 {} 整卷抽取...", ctx, strategy);
            let request = ExtractionRequest::whole_document(strategy, &ctx.document_id, &source);

            match self.whole_document(&pacer, &request).await {
                Ok(fragments) => {
                    info!(
                        "{} ✓ {} 抽取成功，共 {} 道题",
                        ctx,
                        strategy,
                        fragments.len()
                    );
                    return Ok(FlowOutcome {
                        tier: ExtractionTier::WholeDocument(strategy),
                        fragments,
                    });
                }
                Err(e) => {
                    warn!("{} ⚠️ {} 抽取失败: {}", ctx, strategy, e);
                    if let Some(text) = e.last_text() {
                        last_raw_text = Some(text.to_string());
                    }
                }
            }
        }

        // ========== 层级 3: 原子分解 ==========
        let numbers = document.question_numbers();
        if numbers.is_empty() {
            return Err(
                DocumentFailure::new(FailureStage::WholeDocument, "整卷抽取失败且原始文档没有题目")
                    .with_raw_text(last_raw_text),
            );
        }
        info!(
            "{} 🧩 整卷抽取均失败，按 {} 道题进行原子分解",
            ctx,
            numbers.len()
        );

        // 背景是承重调用：全部成功后才继续
        let mut backgrounds = Vec::with_capacity(numbers.len());
        for &number in &numbers {
            let request = ExtractionRequest::atomic(
                ExtractionStrategy::AtomicBackground,
                &ctx.document_id,
                number,
                document.question_text(number),
            );
            match self.background(&pacer, &request).await {
                Ok(background) => {
                    debug!(
                        "{} 题目 {} 背景: {}",
                        ctx,
                        number,
                        truncate_text(&background, 40)
                    );
                    backgrounds.push(background);
                }
                Err(e) => {
                    warn!("{} ❌ 题目 {} 背景抽取失败: {}", ctx, number, e);
                    let raw = e.last_text().map(str::to_string).or(last_raw_text);
                    return Err(DocumentFailure::new(
                        FailureStage::AtomicBackground,
                        format!("题目 {} 背景抽取失败: {}", number, e),
                    )
                    .with_raw_text(raw));
                }
            }
        }

        let mut fragments = Vec::new();
        for (&number, background) in numbers.iter().zip(backgrounds) {
            let source = document.question_text(number);

            let mut base = StructuredQuestion::new(number);
            base.theme = document.theme_for(number);
            base.context = Some(Context {
                background,
                ..Default::default()
            });
            fragments.push(base);

            let diagrams = self.diagrams(&pacer, ctx, number, &source).await;
            if !diagrams.is_empty() {
                let mut fragment = StructuredQuestion::new(number);
                fragment.context = Some(Context {
                    diagrams,
                    ..Default::default()
                });
                fragments.push(fragment);
            }

            let labels = self.labels(&pacer, ctx, number, &source).await;
            let mut extracted = 0;
            for label in &labels {
                if let Some(sub) = self
                    .sub_question(&pacer, ctx, number, label, &source)
                    .await
                {
                    let mut fragment = StructuredQuestion::new(number);
                    fragment.sub_questions.push(sub);
                    fragments.push(fragment);
                    extracted += 1;
                }
            }
            info!(
                "{} ✓ 题目 {} 原子分解完成: 小题 {}/{}",
                ctx,
                number,
                extracted,
                labels.len()
            );
        }

        Ok(FlowOutcome {
            tier: ExtractionTier::Atomic,
            fragments,
        })
    }

    /// 发出一次调用：等待间隔，限流时退避重试
    async fn call(
        &self,
        pacer: &CallPacer,
        request: &ExtractionRequest,
    ) -> Result<String, ExtractionError> {
        pacer.wait().await;
        self.rate_limit
            .call(|| self.backend.extract(request))
            .await
    }

    async fn whole_document(
        &self,
        pacer: &CallPacer,
        request: &ExtractionRequest,
    ) -> Result<Vec<StructuredQuestion>, ExtractionError> {
        let raw = self.call(pacer, request).await?;
        let questions = response_decoder::decode_questions(&raw, &self.engine, request.strategy)?;
        for question in &questions {
            validate_question(question).map_err(|e| {
                ExtractionError::recoverable(request.strategy, e.to_string()).with_last_text(&raw)
            })?;
        }
        Ok(questions)
    }

    async fn background(
        &self,
        pacer: &CallPacer,
        request: &ExtractionRequest,
    ) -> Result<String, ExtractionError> {
        let raw = self.call(pacer, request).await?;
        response_decoder::decode_background(&raw, request.strategy)
    }

    /// 尽力而为：失败返回空列表
    async fn diagrams(
        &self,
        pacer: &CallPacer,
        ctx: &DocumentCtx,
        number: i64,
        source: &str,
    ) -> Vec<Diagram> {
        let strategy = ExtractionStrategy::AtomicDiagrams;
        let request = ExtractionRequest::atomic(strategy, &ctx.document_id, number, source);
        let result = match self.call(pacer, &request).await {
            Ok(raw) => response_decoder::decode_diagrams(&raw, &self.engine, strategy),
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            warn!("{} ⚠️ 题目 {} 图表抽取失败，按无图表处理: {}", ctx, number, e);
            Vec::new()
        })
    }

    /// 尽力而为：失败使用默认标签
    async fn labels(
        &self,
        pacer: &CallPacer,
        ctx: &DocumentCtx,
        number: i64,
        source: &str,
    ) -> Vec<String> {
        let strategy = ExtractionStrategy::AtomicLabelDiscovery;
        let request = ExtractionRequest::atomic(strategy, &ctx.document_id, number, source);
        let result = match self.call(pacer, &request).await {
            Ok(raw) => response_decoder::decode_labels(&raw, &self.engine, strategy),
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            warn!(
                "{} ⚠️ 题目 {} 标签发现失败，使用默认标签 {:?}: {}",
                ctx, number, self.default_labels, e
            );
            self.default_labels.clone()
        })
    }

    /// 尽力而为：失败返回 None，该小题被省略
    async fn sub_question(
        &self,
        pacer: &CallPacer,
        ctx: &DocumentCtx,
        number: i64,
        label: &str,
        source: &str,
    ) -> Option<SubQuestion> {
        let strategy = ExtractionStrategy::AtomicSubQuestion;
        let request =
            ExtractionRequest::atomic(strategy, &ctx.document_id, number, source).with_label(label);
        let result = match self.call(pacer, &request).await {
            Ok(raw) => response_decoder::decode_sub_question(&raw, label, &self.engine, strategy),
            Err(e) => Err(e),
        };
        match result {
            Ok(sub) => Some(sub),
            Err(e) => {
                warn!("{} ⚠️ 题目 {} 小题 {} 抽取失败，已省略: {}", ctx, number, label, e);
                None
            }
        }
    }
}
