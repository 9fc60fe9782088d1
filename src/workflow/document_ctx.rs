//! 文档处理上下文
//!
//! 封装"我正在处理哪一份文档"这一信息

use std::fmt::Display;

use crate::models::RawDocument;

/// 文档处理上下文
#[derive(Debug, Clone)]
pub struct DocumentCtx {
    /// 文档ID（文件名去掉扩展名）
    pub document_id: String,

    /// 文档索引（仅用于日志显示，从1开始）
    pub document_index: usize,

    /// 展示名称
    pub name: String,
}

impl DocumentCtx {
    /// 创建新的文档上下文
    pub fn new(document_id: String, document_index: usize, name: String) -> Self {
        Self {
            document_id,
            document_index,
            name,
        }
    }

    pub fn for_document(document: &RawDocument, document_index: usize) -> Self {
        Self::new(
            document.id.clone(),
            document_index,
            document.display_name().to_string(),
        )
    }
}

impl Display for DocumentCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[文档 {} {}]", self.document_index, self.document_id)
    }
}
