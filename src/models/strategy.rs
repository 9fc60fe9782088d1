use std::fmt;

use serde::{Deserialize, Serialize};

/// 抽取策略
///
/// 先尝试两种整卷策略，都失败后才进入原子分解。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtractionStrategy {
    /// 整卷快速抽取
    WholeDocumentFast,
    /// 整卷精确抽取（更慢）
    WholeDocumentAccurate,
    /// 只抽取背景叙述（纯文本）
    AtomicBackground,
    /// 只抽取图表列表
    AtomicDiagrams,
    /// 只抽取小题标签列表
    AtomicLabelDiscovery,
    /// 抽取单个小题
    AtomicSubQuestion,
}

impl ExtractionStrategy {
    /// 整卷策略的尝试顺序
    pub const WHOLE_DOCUMENT: [ExtractionStrategy; 2] = [
        ExtractionStrategy::WholeDocumentFast,
        ExtractionStrategy::WholeDocumentAccurate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionStrategy::WholeDocumentFast => "whole-document-fast",
            ExtractionStrategy::WholeDocumentAccurate => "whole-document-accurate",
            ExtractionStrategy::AtomicBackground => "atomic-background",
            ExtractionStrategy::AtomicDiagrams => "atomic-diagrams",
            ExtractionStrategy::AtomicLabelDiscovery => "atomic-label-discovery",
            ExtractionStrategy::AtomicSubQuestion => "atomic-sub-question",
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
