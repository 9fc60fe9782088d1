//! 批量文档处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量文档的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：创建日志文件、构建抽取后端
//! 2. **批量加载**：扫描并加载所有原始文档（`Vec<RawDocument>`）
//! 3. **目标筛选**：按文档 id 前缀选择，已有输出的默认跳过
//! 4. **并发控制**：使用 Semaphore 限制同时处理的文档数
//! 5. **失败策略**：继续处理或在第一个失败后停止启动新文档
//! 6. **全局统计**：汇总所有文档的处理结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个文档的细节
//! - **向下委托**：委托 document_processor 处理单个文档

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::{Config, FailurePolicy};
use crate::models::{load_all_documents, RawDocument};
use crate::orchestrator::document_processor::DocumentProcessor;
use crate::services::{ExtractionBackend, LlmExtractor};
use crate::utils::logging;
use crate::workflow::DocumentCtx;

/// 一次批处理的选项（来自命令行）
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// 文档 id 前缀
    pub target: Option<String>,
    /// 处理全部文档
    pub all: bool,
    /// 重新处理已有输出的文档
    pub force: bool,
}

/// 处理统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// 选中的文档数（含跳过的）
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 已有输出而跳过
    pub skipped: usize,
    /// 因停止策略而未启动
    pub not_run: usize,
}

impl BatchStats {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    processor: Arc<DocumentProcessor>,
}

impl App {
    /// 使用指定的抽取后端创建应用
    pub fn new(config: Config, backend: Arc<dyn ExtractionBackend>) -> Self {
        let processor = Arc::new(DocumentProcessor::new(backend, &config));
        Self { config, processor }
    }

    /// 初始化应用（生产环境，使用 LLM 后端）
    pub fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;

        logging::log_startup(config.max_concurrent_documents, &config.input_folder);

        if config.llm_api_key.is_empty() {
            warn!("⚠️ 未设置 LLM_API_KEY");
        }
        let backend: Arc<dyn ExtractionBackend> = Arc::new(LlmExtractor::new(&config));
        Ok(Self::new(config, backend))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 运行应用主逻辑
    pub async fn run(&self, options: &BatchOptions) -> Result<BatchStats> {
        info!("\n📁 正在扫描待处理的文档...");
        let all_documents = load_all_documents(Path::new(&self.config.input_folder)).await?;

        if all_documents.is_empty() {
            warn!("⚠️ 没有找到待处理的原始文档，程序结束");
            return Ok(BatchStats::default());
        }

        let found = all_documents.len();
        let selected = select_documents(all_documents, options, self.config.default_target.as_deref())?;

        let mut stats = BatchStats {
            total: selected.len(),
            ..Default::default()
        };

        let mut pending = Vec::new();
        for document in selected {
            if !options.force && self.processor.writer().exists(&document.id) {
                info!("⏭️ 已有输出，跳过: {}", document.id);
                stats.skipped += 1;
            } else {
                pending.push(document);
            }
        }
        logging::log_documents_selected(stats.total, found, stats.skipped);

        self.process_all_documents(pending, &mut stats).await?;

        // 输出最终统计
        logging::print_final_stats(&stats, &self.config.output_log_file);

        Ok(stats)
    }

    /// 处理所有文档
    async fn process_all_documents(
        &self,
        documents: Vec<RawDocument>,
        stats: &mut BatchStats,
    ) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_documents.max(1)));
        let stop = Arc::new(AtomicBool::new(false));
        let stop_on_failure = self.config.failure_policy == FailurePolicy::StopOnFirstFailure;
        let total = documents.len();

        let mut handles = Vec::new();

        for (idx, document) in documents.into_iter().enumerate() {
            let document_index = idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;

            if stop.load(Ordering::SeqCst) {
                let remaining = total - idx;
                warn!("⏹️ 已有文档失败，停止启动剩余 {} 个文档", remaining);
                stats.not_run += remaining;
                break;
            }

            let processor = self.processor.clone();
            let stop = stop.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let ctx = DocumentCtx::for_document(&document, document_index);
                let ok = processor.process(&document, &ctx).await.is_ok();
                if !ok && stop_on_failure {
                    stop.store(true, Ordering::SeqCst);
                }
                ok
            });
            handles.push((document_index, handle));
        }

        // 等待所有任务完成
        let indices: Vec<usize> = handles.iter().map(|(i, _)| *i).collect();
        let results = futures::future::join_all(handles.into_iter().map(|(_, h)| h)).await;

        for (document_index, result) in indices.into_iter().zip(results) {
            match result {
                Ok(true) => stats.succeeded += 1,
                Ok(false) => stats.failed += 1,
                Err(e) => {
                    error!("[文档 {}] 任务执行失败: {}", document_index, e);
                    stats.failed += 1;
                }
            }
        }

        Ok(())
    }
}

/// 按目标筛选文档
///
/// `--all` 选择全部；否则按命令行目标或配置的默认目标做 id 前缀匹配。
pub fn select_documents(
    documents: Vec<RawDocument>,
    options: &BatchOptions,
    default_target: Option<&str>,
) -> Result<Vec<RawDocument>> {
    if options.all {
        return Ok(documents);
    }

    let Some(prefix) = options.target.as_deref().or(default_target) else {
        anyhow::bail!("未指定目标：请传入文档 id 前缀，或使用 --all 处理全部文档");
    };

    let selected: Vec<RawDocument> = documents
        .into_iter()
        .filter(|d| d.id.starts_with(prefix))
        .collect();
    if selected.is_empty() {
        warn!("⚠️ 没有 id 以 \"{}\" 开头的文档", prefix);
    }
    Ok(selected)
}
