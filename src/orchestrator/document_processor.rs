//! 单个文档处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责把一份原始文档变成最终的结构化结果，是文档级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **分层抽取**：委托 `ExtractionFlow`
//! 2. **片段合并**：按题号合并
//! 3. **校验与分值分配**：合并后校验结构，分配分值后校验总分
//! 4. **结果输出**：全部成功才写结果文件
//! 5. **失败诊断**：任一阶段失败写诊断文件，不碰已有结果

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::Config;
use crate::error::{DocumentFailure, FailureStage};
use crate::models::{validate_document, validate_points, RawDocument, StructuredQuestion};
use crate::services::{allocate, merge, ExtractionBackend, OutputWriter};
use crate::workflow::{DocumentCtx, ExtractionFlow, ExtractionTier};

/// 单个文档的处理结果
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub tier: ExtractionTier,
    pub question_count: usize,
    pub output_path: PathBuf,
}

/// 单个文档处理器
///
/// 每个文档独占一次 `process` 调用，文档之间只共享输出目录。
pub struct DocumentProcessor {
    flow: ExtractionFlow,
    writer: OutputWriter,
}

impl DocumentProcessor {
    pub fn new(backend: Arc<dyn ExtractionBackend>, config: &Config) -> Self {
        Self {
            flow: ExtractionFlow::new(backend, config),
            writer: OutputWriter::new(&config.output_folder, &config.diagnostic_folder),
        }
    }

    pub fn writer(&self) -> &OutputWriter {
        &self.writer
    }

    /// 处理单个文档
    ///
    /// 失败时已经写好诊断文件并记录了错误日志。
    pub async fn process(
        &self,
        document: &RawDocument,
        ctx: &DocumentCtx,
    ) -> Result<DocumentReport, DocumentFailure> {
        log_document_start(ctx, document);

        match self.run(document, ctx).await {
            Ok(report) => {
                info!(
                    "{} ✅ 处理完成: {} 道题 (层级: {}) → {}",
                    ctx,
                    report.question_count,
                    report.tier,
                    report.output_path.display()
                );
                Ok(report)
            }
            Err(failure) => {
                error!(
                    "{} ❌ 处理失败 (阶段: {}): {}",
                    ctx, failure.stage, failure.message
                );
                match self.writer.write_diagnostic(&ctx.document_id, &failure) {
                    Ok(path) => info!("{} 📝 诊断文件: {}", ctx, path.display()),
                    Err(e) => error!("{} 写入诊断文件失败: {:#}", ctx, e),
                }
                Err(failure)
            }
        }
    }

    async fn run(
        &self,
        document: &RawDocument,
        ctx: &DocumentCtx,
    ) -> Result<DocumentReport, DocumentFailure> {
        let outcome = self.flow.run(document, ctx).await?;
        let questions = finalize(outcome.fragments)?;

        let output_path = self
            .writer
            .write_output(&ctx.document_id, &questions)
            .map_err(|e| DocumentFailure::new(FailureStage::Output, format!("{:#}", e)))?;

        Ok(DocumentReport {
            tier: outcome.tier,
            question_count: questions.len(),
            output_path,
        })
    }
}

/// 合并 → 校验 → 分配分值 → 校验总分
pub fn finalize(fragments: Vec<StructuredQuestion>) -> Result<Vec<StructuredQuestion>, DocumentFailure> {
    let merged = merge(fragments);

    validate_document(&merged).map_err(|e| {
        DocumentFailure::new(FailureStage::Validation, e.to_string())
            .with_raw_text(serde_json::to_string_pretty(&merged).ok())
    })?;

    let mut finalized = Vec::with_capacity(merged.len());
    for question in merged {
        let question = allocate(question);
        if let Err(e) = validate_points(&question) {
            return Err(DocumentFailure::new(FailureStage::Allocation, e.to_string())
                .with_raw_text(serde_json::to_string_pretty(&question).ok()));
        }
        finalized.push(question);
    }
    Ok(finalized)
}

fn log_document_start(ctx: &DocumentCtx, document: &RawDocument) {
    info!("{} 开始处理", ctx);
    info!("{} 名称: {}", ctx, ctx.name);
    info!("{} 题目对象数: {}", ctx, document.questions.len());
}
