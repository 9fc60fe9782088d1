//! 片段合并 - 业务能力层
//!
//! 原子分解会为同一道题产出多个不完整的片段，这里按题号把它们合并成一条记录：
//! - 第一个片段作为基础
//! - 背景文本追加（空行分隔），不覆盖
//! - 图表按 id 去重，先出现的保留
//! - 小题按出现顺序拼接
//! - theme / description 只在基础记录缺失时补上
//!
//! 对已经合并过的结果再次合并不会有任何变化。

use std::collections::HashMap;

use tracing::warn;

use crate::models::{Context, StructuredQuestion};

/// 背景段落之间的分隔
const BACKGROUND_SEPARATOR: &str = "\n\n";

/// 按题号合并片段，分组顺序与题号首次出现的顺序一致
pub fn merge(fragments: Vec<StructuredQuestion>) -> Vec<StructuredQuestion> {
    let mut merged: Vec<StructuredQuestion> = Vec::new();
    let mut positions: HashMap<i64, usize> = HashMap::new();

    for fragment in fragments {
        let existing = positions.get(&fragment.question_number).copied();
        match existing {
            Some(idx) => merge_into(&mut merged[idx], fragment),
            None => {
                positions.insert(fragment.question_number, merged.len());
                merged.push(fragment);
            }
        }
    }

    merged
}

/// 把一个片段并入基础记录
fn merge_into(base: &mut StructuredQuestion, fragment: StructuredQuestion) {
    if base.theme.trim().is_empty() && !fragment.theme.trim().is_empty() {
        base.theme = fragment.theme;
    }
    if base.description.is_none() {
        base.description = fragment.description;
    }

    if let Some(incoming) = fragment.context {
        let number = base.question_number;
        let ctx = base.context.get_or_insert_with(Context::default);
        merge_context(ctx, incoming, number);
    }

    base.sub_questions.extend(fragment.sub_questions);
}

fn merge_context(base: &mut Context, incoming: Context, number: i64) {
    if base.title.trim().is_empty() {
        base.title = incoming.title;
    }

    let background = incoming.background.trim();
    if !background.is_empty() {
        if base.background.trim().is_empty() {
            base.background = background.to_string();
        } else {
            base.background.push_str(BACKGROUND_SEPARATOR);
            base.background.push_str(background);
        }
    }

    for diagram in incoming.diagrams {
        let existing = base.diagrams.iter().position(|d| d.id == diagram.id);
        match existing {
            Some(idx) if base.diagrams[idx].content != diagram.content => {
                warn!(
                    "题目 {} 的图表 {} 重复且内容不同，保留先出现的版本",
                    number, diagram.id
                );
            }
            Some(_) => {}
            None => base.diagrams.push(diagram),
        }
    }
}
