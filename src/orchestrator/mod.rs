//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量文档处理器
//! - 加载并筛选原始文档（Vec<RawDocument>）
//! - 控制并发数量（Semaphore）
//! - 执行失败策略（继续 / 停止启动新文档）
//! - 输出全局统计信息
//!
//! ### `document_processor` - 单个文档处理器
//! - 分层抽取 → 合并 → 校验 → 分配分值 → 写结果
//! - 失败时写诊断文件
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<RawDocument>)
//!     ↓
//! document_processor (处理单个 RawDocument)
//!     ↓
//! workflow::ExtractionFlow (分层抽取)
//!     ↓
//! services (能力层：extractor / decoder / merger / allocator / writer)
//!     ↓
//! repair + models (基础能力：结构修复、数据模型、校验)
//! ```

pub mod batch_processor;
pub mod document_processor;

// 重新导出主要类型
pub use batch_processor::{select_documents, App, BatchOptions, BatchStats};
pub use document_processor::{finalize, DocumentProcessor, DocumentReport};
