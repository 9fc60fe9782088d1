//! 分值分配 - 业务能力层
//!
//! 把 100 分按遍历顺序分给所有叶子小题：`base = 100 / n`，前 `100 % n` 个叶子多 1 分。
//! 已有分值的叶子保持不变，但仍参与计数和余数的消耗顺序。

use tracing::debug;

use crate::models::{StructuredQuestion, TOTAL_POINTS};

/// 分配分值并返回完成的记录
pub fn allocate(mut question: StructuredQuestion) -> StructuredQuestion {
    allocate_in_place(&mut question);
    question
}

/// 原地分配分值，返回叶子数量
pub fn allocate_in_place(question: &mut StructuredQuestion) -> usize {
    let number = question.question_number;
    let mut leaves = question.leaves_mut();
    let n = leaves.len();
    if n == 0 {
        debug!("题目 {} 没有小题，跳过分值分配", number);
        return 0;
    }

    let count = n as i64;
    let base = TOTAL_POINTS / count;
    let remainder = (TOTAL_POINTS % count) as usize;

    for (i, leaf) in leaves.iter_mut().enumerate() {
        if leaf.point.is_none() {
            leaf.point = Some(if i < remainder { base + 1 } else { base });
        }
    }

    debug!("题目 {}: {} 个叶子，基础分 {}，余数 {}", number, n, base, remainder);
    n
}
