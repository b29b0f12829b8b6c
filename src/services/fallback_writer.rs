//! 本地兜底写入服务 - 业务能力层
//!
//! 存储不可用时记录未同步的经验值奖励，保证学员看到的 "+50 XP" 不会悄悄丢失。
//! 记录保存在内存中，并按行追加到 JSON Lines 文件（如果配置了路径）。
//! 与持久化存储的对账不在这里处理。

use anyhow::Result;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::models::PendingAward;

/// 兜底写入服务
///
/// 职责：
/// - 保存未同步的奖励记录，统一标记 `synced = false`
/// - 不关心为什么存储失败
/// - 不重试
pub struct FallbackWriter {
    file_path: Option<String>,
    pending: Mutex<Vec<PendingAward>>,
}

impl FallbackWriter {
    /// 只保存在内存中
    pub fn in_memory() -> Self {
        Self {
            file_path: None,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// 同时追加写入指定文件
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            file_path: Some(path.into()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// 记录一次未同步的奖励
    ///
    /// 文件写入失败只记日志，内存记录仍然保留
    pub async fn record(&self, mut award: PendingAward) -> PendingAward {
        award.synced = false;

        debug!(
            "写入未同步奖励: 学员 {} | +{} XP | 原因: {}",
            award.learner_id, award.xp_amount, award.reason
        );

        if let Some(path) = &self.file_path {
            if let Err(e) = self.append_line(path, &award).await {
                warn!("⚠️ 未同步奖励写入文件 {} 失败: {}", path, e);
            }
        }

        self.pending.lock().await.push(award.clone());
        award
    }

    /// 当前会话内所有未同步记录
    pub async fn pending(&self) -> Vec<PendingAward> {
        self.pending.lock().await.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    async fn append_line(&self, path: &str, award: &PendingAward) -> Result<()> {
        let mut line = serde_json::to_string(award)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

impl Default for FallbackWriter {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn award(xp: u64) -> PendingAward {
        PendingAward {
            learner_id: "l1".to_string(),
            xp_amount: xp,
            completed_quiz: true,
            attempted_at: Utc::now(),
            reason: "存储不可用".to_string(),
            synced: true,
        }
    }

    #[tokio::test]
    async fn test_record_forces_unsynced_and_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unsynced.jsonl");
        let writer = FallbackWriter::with_path(path.to_string_lossy());

        let first = writer.record(award(50)).await;
        writer.record(award(20)).await;

        assert!(!first.synced);
        assert_eq!(writer.pending_count().await, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<PendingAward> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].xp_amount, 20);
        assert!(lines.iter().all(|a| !a.synced));
    }

    #[tokio::test]
    async fn test_unwritable_file_keeps_memory_record() {
        let writer = FallbackWriter::with_path("/no/such/dir/unsynced.jsonl");
        writer.record(award(10)).await;
        assert_eq!(writer.pending().await.len(), 1);
    }
}
