//! 结构修复
//!
//! - `tokenizer` - 单行分词：字符串值定位、转义判断、行尾分类
//! - `engine` - 修复循环：严格解析 → 按报错行做局部变换 → 重试

pub mod engine;
pub mod tokenizer;

pub use engine::{repair, RepairEngine, Repaired, DEFAULT_REPAIR_BUDGET};
