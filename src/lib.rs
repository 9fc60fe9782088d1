//! # Exam Structure
//!
//! 把上游 OCR 抽取的试卷文本整理成经过校验、带分值的结构化题目
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础能力层（Models / Repair）
//! - `models/` - 原始文档、结构化题目、抽取策略、校验
//! - `repair/` - 结构修复引擎，把几乎合法的 JSON 修到可解析
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程
//! - `ExtractionBackend` - 抽取能力（`LlmExtractor` / `MockBackend`）
//! - `response_decoder` - 代码块剥离 + 修复 + 反序列化
//! - `fragment_merger` - 按题号合并片段
//! - `point_allocator` - 100 分分配到叶子小题
//! - `OutputWriter` - 写结果文件 / 诊断文件
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一份文档"的分层抽取流程
//! - `DocumentCtx` - 上下文封装（document_id + document_index）
//! - `ExtractionFlow` - 整卷快速 → 整卷精确 → 原子分解
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量文档处理器，管理筛选、并发和失败策略
//! - `orchestrator/document_processor` - 单个文档处理器，抽取 → 合并 → 分配 → 输出
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod repair;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, FailurePolicy};
pub use error::{DocumentFailure, ExtractionError, RepairError};
pub use models::{ExtractionStrategy, RawDocument, StructuredQuestion};
pub use orchestrator::{App, BatchOptions, BatchStats};
pub use repair::RepairEngine;
pub use services::{ExtractionBackend, LlmExtractor, MockBackend};
pub use workflow::{DocumentCtx, ExtractionFlow};
