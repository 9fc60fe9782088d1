//! 单行分词
//!
//! 修复引擎只需要在一行内回答几个问题：键值分界在哪里、某个引号是否已转义、
//! 行尾是否已经是一个值的结束符。这里全部按字节处理：`"` 和 `\` 都是 ASCII，
//! 不会出现在多字节 UTF-8 字符内部。

/// 能结束一个值的行尾字符
const VALUE_CLOSERS: [u8; 4] = [b'"', b'}', b',', b']'];

/// 紧挨在 `idx` 之前的连续反斜杠数量
pub fn preceding_backslashes(bytes: &[u8], idx: usize) -> usize {
    bytes[..idx]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count()
}

/// `idx` 处的字符是否已被转义（前面有奇数个反斜杠）
pub fn is_escaped(bytes: &[u8], idx: usize) -> bool {
    preceding_backslashes(bytes, idx) % 2 == 1
}

/// 从 `open`（一个引号）之后找到第一个未转义的引号
fn string_end(bytes: &[u8], open: usize) -> Option<usize> {
    (open + 1..bytes.len()).find(|&i| bytes[i] == b'"' && !is_escaped(bytes, i))
}

fn skip_whitespace(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx += 1;
    }
    idx
}

/// 一行中键和字符串值的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyValueSplit {
    /// 键的起止引号位置（数组元素没有键）
    pub key: Option<(usize, usize)>,
    /// 值的起始引号位置
    pub value_open: usize,
}

fn skip_structural(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len()
        && (bytes[idx].is_ascii_whitespace() || b"{[,}]".contains(&bytes[idx]))
    {
        idx += 1;
    }
    idx
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || b",{}[]\"".contains(&b)
}

/// `open` 处的字符串后面紧跟 `:`，即它是一个键
fn key_end(bytes: &[u8], open: usize) -> Option<usize> {
    string_end(bytes, open)
        .filter(|&end| bytes.get(skip_whitespace(bytes, end + 1)) == Some(&b':'))
}

/// 从 `after` 开始的剩余部分能否跟在一个值之后
///
/// 接受：行尾；`}` `]` 后接行尾或结构字符；`,` 后接行尾、开括号、
/// 一个键，或另一个同样能正常结束的字符串。
fn closes_value(bytes: &[u8], after: usize) -> bool {
    let next = skip_whitespace(bytes, after);
    match bytes.get(next) {
        None => true,
        Some(b'}') | Some(b']') => matches!(
            bytes.get(skip_whitespace(bytes, next + 1)),
            None | Some(b',') | Some(b'}') | Some(b']')
        ),
        Some(b',') => {
            let rest = skip_whitespace(bytes, next + 1);
            match bytes.get(rest) {
                None | Some(b'{') | Some(b'[') => true,
                Some(b'"') => {
                    key_end(bytes, rest).is_some()
                        || string_end(bytes, rest).map_or(false, |end| closes_value(bytes, end + 1))
                }
                _ => false,
            }
        }
        _ => false,
    }
}

/// 字符串值真正的结束引号
///
/// 值内部可能有未转义的引号，取第一个后面结构合法的未转义引号。
/// 值在本行内没有结束时返回 `None`。
pub fn value_end(bytes: &[u8], open: usize) -> Option<usize> {
    (open + 1..bytes.len())
        .find(|&i| bytes[i] == b'"' && !is_escaped(bytes, i) && closes_value(bytes, i + 1))
}

/// 列出一行中所有字符串值的位置
///
/// 行首的 `{` `[` `,` 以及非字符串值（数字、布尔、嵌套对象的开括号）都会跳过，
/// 所以紧凑的单行对象和数组元素对象同样适用。值在本行没有结束时到此为止。
pub fn string_values(line: &str) -> Vec<KeyValueSplit> {
    let bytes = line.as_bytes();
    let mut values = Vec::new();
    let mut idx = skip_structural(bytes, 0);

    while idx < bytes.len() {
        if bytes[idx] != b'"' {
            // 数字、布尔、null
            while idx < bytes.len() && !is_delimiter(bytes[idx]) {
                idx += 1;
            }
            idx = skip_structural(bytes, idx);
            continue;
        }

        let split = match key_end(bytes, idx) {
            Some(end) => {
                let colon = skip_whitespace(bytes, end + 1);
                let value = skip_whitespace(bytes, colon + 1);
                if bytes.get(value) != Some(&b'"') {
                    idx = value;
                    continue;
                }
                KeyValueSplit {
                    key: Some((idx, end)),
                    value_open: value,
                }
            }
            None => KeyValueSplit {
                key: None,
                value_open: idx,
            },
        };
        values.push(split);

        match value_end(bytes, split.value_open) {
            Some(close) => idx = skip_structural(bytes, close + 1),
            None => break,
        }
    }
    values
}

/// 转义报错位置所在字符串值内部的未转义引号
///
/// `column` 是解析器报告的列（从 1 开始的字节列）。取报错位置之前最后一个
/// 字符串值，结束引号由 [`value_end`] 确定，只在这一对起止引号之间插入反斜杠，
/// 同一行的其他键值对保持原样。没有需要转义的引号时返回 `None`。
pub fn escape_interior_quotes(line: &str, column: usize) -> Option<String> {
    let bytes = line.as_bytes();
    let error_at = column.saturating_sub(1);

    let values = string_values(line);
    let target = values
        .iter()
        .rev()
        .find(|v| v.value_open < error_at)
        .or_else(|| values.first())?;
    let open = target.value_open;
    let close = value_end(bytes, open)?;

    let interior: Vec<usize> = (open + 1..close)
        .filter(|&i| bytes[i] == b'"' && !is_escaped(bytes, i))
        .collect();
    if interior.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(line.len() + interior.len());
    let mut last = 0;
    for idx in interior {
        out.push_str(&line[last..idx]);
        out.push('\\');
        last = idx;
    }
    out.push_str(&line[last..]);
    Some(out)
}

/// 行尾（忽略空白）是否是值的结束符 `"` `}` `,` `]`
pub fn ends_with_value_close(line: &str) -> bool {
    line.trim_end()
        .as_bytes()
        .last()
        .map_or(false, |b| VALUE_CLOSERS.contains(b))
}

/// 行尾（忽略空白）是否是开括号
pub fn ends_with_open_brace(line: &str) -> bool {
    matches!(line.trim_end().as_bytes().last(), Some(b'{') | Some(b'['))
}

/// 该行能否接上下一行：既不是值的结尾，也不是开括号
pub fn is_open_ended(line: &str) -> bool {
    !line.trim().is_empty() && !ends_with_value_close(line) && !ends_with_open_brace(line)
}
