//! 输出写入服务 - 业务能力层
//!
//! 只负责"写结果文件 / 写诊断文件"能力，不关心流程

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tracing::debug;

use crate::error::DocumentFailure;
use crate::models::StructuredQuestion;

/// 诊断文件后缀
const DIAGNOSTIC_SUFFIX: &str = ".failed.txt";

/// 输出写入服务
///
/// 职责：
/// - 成功时写 `<output_dir>/<doc_id>.json`，先写临时文件再重命名
/// - 失败时写 `<diagnostic_dir>/<doc_id>.failed.txt`，不碰已有的结果文件
pub struct OutputWriter {
    output_dir: PathBuf,
    diagnostic_dir: PathBuf,
}

impl OutputWriter {
    pub fn new(output_dir: impl Into<PathBuf>, diagnostic_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            diagnostic_dir: diagnostic_dir.into(),
        }
    }

    pub fn output_path(&self, document_id: &str) -> PathBuf {
        self.output_dir.join(format!("{}.json", document_id))
    }

    pub fn diagnostic_path(&self, document_id: &str) -> PathBuf {
        self.diagnostic_dir
            .join(format!("{}{}", document_id, DIAGNOSTIC_SUFFIX))
    }

    /// 结果文件是否已存在
    pub fn exists(&self, document_id: &str) -> bool {
        self.output_path(document_id).is_file()
    }

    /// 写入最终结果
    pub fn write_output(
        &self,
        document_id: &str,
        questions: &[StructuredQuestion],
    ) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(questions).context("序列化结果失败")?;
        let path = self.output_path(document_id);
        write_atomic(&self.output_dir, &path, json.as_bytes())?;
        debug!("写入结果: {}", path.display());
        Ok(path)
    }

    /// 写入诊断文件
    pub fn write_diagnostic(
        &self,
        document_id: &str,
        failure: &DocumentFailure,
    ) -> Result<PathBuf> {
        let mut content = format!(
            "文档: {}\n阶段: {}\n原因: {}\n时间: {}\n",
            document_id,
            failure.stage,
            failure.message,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        content.push_str("========== 最后的原始文本 ==========\n");
        match &failure.last_raw_text {
            Some(text) => content.push_str(text),
            None => content.push_str("(无)"),
        }
        content.push('\n');

        let path = self.diagnostic_path(document_id);
        write_atomic(&self.diagnostic_dir, &path, content.as_bytes())?;
        debug!("写入诊断文件: {}", path.display());
        Ok(path)
    }
}

/// 写临时文件后重命名，读者不会看到写了一半的文件
///
/// 任何一步失败都会删除临时文件。
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("创建目录失败: {}", dir.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    let result = write_and_sync(&tmp_path, bytes).and_then(|()| {
        fs::rename(&tmp_path, path)
            .with_context(|| format!("重命名失败: {} -> {}", tmp_path.display(), path.display()))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_and_sync(tmp_path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(tmp_path)
        .with_context(|| format!("创建临时文件失败: {}", tmp_path.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("写入临时文件失败: {}", tmp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("同步临时文件失败: {}", tmp_path.display()))?;
    Ok(())
}
