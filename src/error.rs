//! 错误类型
//!
//! 抽取调用的结果分三类：
//! - `Retryable`：上游限流，退避后重试，不消耗修复/抽取预算
//! - `Recoverable`：输出格式损坏或校验未通过，升级到下一个抽取层级
//! - `Fatal`：其他调用失败（网络、鉴权等）
//!
//! 文档级失败统一用 [`DocumentFailure`] 表示，附带最后一次失败的原始文本。

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::models::ExtractionStrategy;

/// 单次抽取调用的错误
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    /// 上游限流
    #[error("[{strategy}] 请求被限流: {message}")]
    Retryable {
        strategy: ExtractionStrategy,
        message: String,
        retry_after: Option<Duration>,
    },
    /// 输出可修复范围外 / 校验失败
    #[error("[{strategy}] 输出无效: {message}")]
    Recoverable {
        strategy: ExtractionStrategy,
        message: String,
        /// 最后一次未通过修复的原始文本
        last_text: Option<String>,
    },
    /// 其他调用失败
    #[error("[{strategy}] 调用失败: {message}")]
    Fatal {
        strategy: ExtractionStrategy,
        message: String,
    },
}

impl ExtractionError {
    pub fn retryable(strategy: ExtractionStrategy, message: impl Into<String>) -> Self {
        ExtractionError::Retryable {
            strategy,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn recoverable(strategy: ExtractionStrategy, message: impl Into<String>) -> Self {
        ExtractionError::Recoverable {
            strategy,
            message: message.into(),
            last_text: None,
        }
    }

    pub fn fatal(strategy: ExtractionStrategy, message: impl Into<String>) -> Self {
        ExtractionError::Fatal {
            strategy,
            message: message.into(),
        }
    }

    /// 附带修复失败时的原始文本
    pub fn with_last_text(self, text: impl Into<String>) -> Self {
        match self {
            ExtractionError::Recoverable {
                strategy, message, ..
            } => ExtractionError::Recoverable {
                strategy,
                message,
                last_text: Some(text.into()),
            },
            other => other,
        }
    }

    pub fn last_text(&self) -> Option<&str> {
        match self {
            ExtractionError::Recoverable { last_text, .. } => last_text.as_deref(),
            _ => None,
        }
    }
}

/// 结构修复失败
#[derive(Debug, Clone, Error)]
pub enum RepairError {
    /// 尝试次数用尽
    #[error("修复尝试 {attempts} 次后仍无法解析")]
    Exhausted { attempts: usize, last_text: String },
    /// 同一行连续失败且两种修复都无法改变文本
    #[error("第 {line} 行连续失败且无法继续修复")]
    Stuck { line: usize, last_text: String },
    /// 解析错误没有可用的行号（如空输入）
    #[error("无法定位的解析错误: {message}")]
    Unlocatable { message: String, last_text: String },
}

impl RepairError {
    /// 失败时的最后文本，用于写诊断文件
    pub fn last_text(&self) -> &str {
        match self {
            RepairError::Exhausted { last_text, .. }
            | RepairError::Stuck { last_text, .. }
            | RepairError::Unlocatable { last_text, .. } => last_text,
        }
    }
}

/// 文档在哪个阶段失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// 整卷抽取（只在原子分解也无法启动时出现）
    WholeDocument,
    /// 原子分解中的背景抽取（承重调用）
    AtomicBackground,
    /// 合并后的记录校验
    Validation,
    /// 分值分配
    Allocation,
    /// 输出写入
    Output,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureStage::WholeDocument => "整卷抽取",
            FailureStage::AtomicBackground => "背景抽取",
            FailureStage::Validation => "记录校验",
            FailureStage::Allocation => "分值分配",
            FailureStage::Output => "输出写入",
        };
        f.write_str(name)
    }
}

/// 文档级失败
#[derive(Debug, Clone, Error)]
#[error("文档处理失败 (阶段: {stage}): {message}")]
pub struct DocumentFailure {
    pub stage: FailureStage,
    pub message: String,
    /// 最后一次修复失败的原始文本
    pub last_raw_text: Option<String>,
}

impl DocumentFailure {
    pub fn new(stage: FailureStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            last_raw_text: None,
        }
    }

    pub fn with_raw_text(mut self, text: Option<String>) -> Self {
        self.last_raw_text = text;
        self
    }
}

/// 校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("题号必须大于 0 (当前: {0})")]
    InvalidNumber(i64),
    #[error("题目 {0} 的背景为空")]
    EmptyBackground(i64),
    #[error("题目 {number} 中图表 id 重复: {id}")]
    DuplicateDiagramId { number: i64, id: String },
    #[error("题目 {0} 存在空的小题标签")]
    EmptyLabel(i64),
    #[error("题目 {0} 存在未分配分值的小题")]
    MissingPoint(i64),
    #[error("题目 {number} 的小题分值 {point} 超出 0..=100")]
    PointOutOfRange { number: i64, point: i64 },
    #[error("题目 {number} 小题分值合计为 {total}，应为 100")]
    PointTotal { number: i64, total: i64 },
    #[error("文档中没有任何题目")]
    EmptyDocument,
    #[error("题号重复: {0}")]
    DuplicateNumber(i64),
}
