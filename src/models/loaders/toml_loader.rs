use crate::models::quiz::QuizDefinition;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载测验定义
pub async fn load_quiz_file(toml_file_path: &Path) -> Result<QuizDefinition> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let quiz: QuizDefinition = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    Ok(quiz.with_file_path(toml_file_path.to_string_lossy().to_string()))
}

/// 从文件夹中加载所有测验，解析失败的文件会被跳过
///
/// 返回结果按测验 id 排序
pub async fn load_all_quizzes(folder_path: &str) -> Result<Vec<QuizDefinition>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut quizzes = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("toml") {
            continue;
        }

        tracing::debug!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_quiz_file(&path).await {
            Ok(quiz) => {
                tracing::info!("成功加载测验 {} ({} 道原始题目)", quiz.id, quiz.questions.len());
                quizzes.push(quiz);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    quizzes.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(quizzes)
}
