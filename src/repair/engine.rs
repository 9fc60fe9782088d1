//! 结构修复引擎
//!
//! 假设输入几乎是合法 JSON，缺陷只有两类：
//! 1. 字符串值内部有未转义的引号
//! 2. 字符串值被拆成了多行而换行没有转义
//!
//! 每轮先严格解析，失败则根据报错行做一次局部变换后重试，最多 `budget` 轮。

use serde_json::Value;
use tracing::debug;

use super::tokenizer;
use crate::error::RepairError;

/// 默认修复尝试次数
pub const DEFAULT_REPAIR_BUDGET: usize = 50;

/// 超过该字符数的报错行优先尝试引号转义
const LONG_LINE_CHARS: usize = 200;

/// 修复成功的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Repaired {
    pub value: Value,
    /// 最终可解析的文本
    pub text: String,
    /// 实际应用的变换次数，合法输入为 0
    pub transformations: usize,
}

/// 一次修复会话的状态，修复结束即丢弃
#[derive(Debug, Clone)]
struct RepairState {
    lines: Vec<String>,
    attempts_used: usize,
    last_failure_line: Option<usize>,
    transformations: usize,
}

impl RepairState {
    fn new(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
            attempts_used: 0,
            last_failure_line: None,
            transformations: 0,
        }
    }

    fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// 引号转义：改变了文本返回 true
    fn escape_quotes(&mut self, idx: usize, column: usize) -> bool {
        match tokenizer::escape_interior_quotes(&self.lines[idx], column) {
            Some(fixed) => {
                debug!("修复: 第 {} 行第 {} 列附近转义内部引号", idx + 1, column);
                self.lines[idx] = fixed;
                true
            }
            None => false,
        }
    }

    /// 行合并：优先并入上一行，否则把下一行并入本行
    fn merge_lines(&mut self, idx: usize) -> bool {
        if idx > 0 && tokenizer::is_open_ended(&self.lines[idx - 1]) {
            debug!("修复: 第 {} 行并入上一行", idx + 1);
            let current = self.lines.remove(idx);
            join_escaped(&mut self.lines[idx - 1], &current);
            return true;
        }
        if idx + 1 < self.lines.len() && tokenizer::is_open_ended(&self.lines[idx]) {
            debug!("修复: 第 {} 行并入下一行", idx + 1);
            let next = self.lines.remove(idx + 1);
            join_escaped(&mut self.lines[idx], &next);
            return true;
        }
        false
    }
}

/// 用转义换行 `\n` 连接两行
fn join_escaped(target: &mut String, next: &str) {
    let trimmed_len = target.trim_end_matches('\r').len();
    target.truncate(trimmed_len);
    target.push_str("\\n");
    target.push_str(next.trim_end_matches('\r'));
}

/// 结构修复引擎，本身无状态，每次调用新建 `RepairState`
#[derive(Debug, Clone, Copy)]
pub struct RepairEngine {
    budget: usize,
}

impl Default for RepairEngine {
    fn default() -> Self {
        Self::new(DEFAULT_REPAIR_BUDGET)
    }
}

impl RepairEngine {
    pub fn new(budget: usize) -> Self {
        Self {
            budget: budget.max(1),
        }
    }

    /// 解析文本，必要时做局部修复
    pub fn repair(&self, text: &str) -> Result<Repaired, RepairError> {
        let mut state = RepairState::new(text);

        while state.attempts_used < self.budget {
            state.attempts_used += 1;
            let current = state.text();

            let err = match serde_json::from_str::<Value>(&current) {
                Ok(value) => {
                    return Ok(Repaired {
                        value,
                        text: current,
                        transformations: state.transformations,
                    });
                }
                Err(err) => err,
            };

            let line = err.line();
            if line == 0 || line > state.lines.len() {
                return Err(RepairError::Unlocatable {
                    message: err.to_string(),
                    last_text: current,
                });
            }
            let idx = line - 1;
            let stuck = state.last_failure_line == Some(line);
            state.last_failure_line = Some(line);

            debug!(
                "修复第 {} 轮: 第 {} 行解析失败 ({})",
                state.attempts_used, line, err
            );

            let long_line = state.lines[idx].chars().count() > LONG_LINE_CHARS;
            let changed = ((long_line || stuck) && state.escape_quotes(idx, err.column()))
                || state.merge_lines(idx);

            if changed {
                state.transformations += 1;
            } else if stuck {
                return Err(RepairError::Stuck {
                    line,
                    last_text: current,
                });
            }
        }

        Err(RepairError::Exhausted {
            attempts: state.attempts_used,
            last_text: state.text(),
        })
    }
}

/// 使用默认预算修复
pub fn repair(text: &str) -> Result<Repaired, RepairError> {
    RepairEngine::default().repair(text)
}
