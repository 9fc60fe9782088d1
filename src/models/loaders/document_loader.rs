use crate::models::raw::{RawDocument, RawQuestion};
use crate::repair::RepairEngine;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 支持的原始文档扩展名
const SUPPORTED_EXTENSIONS: [&str; 2] = ["json", "toml"];

/// 从文件加载原始文档
///
/// JSON 文件先经过结构修复，允许上游输出中存在未转义的引号或跨行字符串。
/// 顶层既可以是带 `questions` 的对象，也可以直接是题目数组。
pub async fn load_raw_document(path: &Path) -> Result<RawDocument> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取原始文档: {}", path.display()))?;

    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or_default();
    let mut document = match extension {
        "toml" => toml::from_str::<RawDocument>(&content)
            .with_context(|| format!("无法解析TOML文件: {}", path.display()))?,
        _ => parse_json_document(&content)
            .with_context(|| format!("无法解析JSON文件: {}", path.display()))?,
    };

    document.id = document_id(path);
    document.file_path = Some(path.to_string_lossy().to_string());

    Ok(document)
}

fn parse_json_document(content: &str) -> Result<RawDocument> {
    let repaired = RepairEngine::default().repair(content)?;
    if repaired.transformations > 0 {
        tracing::warn!("原始文档经过 {} 次结构修复", repaired.transformations);
    }

    let document = if repaired.value.is_array() {
        let questions: Vec<RawQuestion> = serde_json::from_value(repaired.value)?;
        RawDocument {
            questions,
            ..Default::default()
        }
    } else {
        serde_json::from_value(repaired.value)?
    };
    Ok(document)
}

/// 文档标识：文件名去掉扩展名
pub fn document_id(path: &Path) -> String {
    path.file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// 从文件夹中加载所有原始文档，按标识排序
pub async fn load_all_documents(folder_path: &Path) -> Result<Vec<RawDocument>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path.display());
    }

    let mut documents = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|s| s.to_str())
            .map_or(false, |ext| SUPPORTED_EXTENSIONS.contains(&ext));
        if !supported {
            continue;
        }

        tracing::debug!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_raw_document(&path).await {
            Ok(document) => {
                tracing::debug!("成功加载 {} 个题目对象", document.questions.len());
                documents.push(document);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    documents.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(documents)
}
