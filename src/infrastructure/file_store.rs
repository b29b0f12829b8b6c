//! JSON 文件存储
//!
//! 整个存储是一个 JSON 文档，读-改-写在同一把锁内完成，
//! 因此版本比较和写入对本进程是原子的

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::infrastructure::store::ProgressionStore;
use crate::models::{AttemptSummary, ProgressionState};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    progressions: HashMap<String, ProgressionState>,
    #[serde(default)]
    attempts: Vec<AttemptSummary>,
}

pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> StoreResult<StoreDocument> {
        match fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(StoreDocument::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(StoreError::io(self.path.display().to_string(), e)),
        }
    }

    async fn write_document(&self, document: &StoreDocument) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(document)?;
        // 写临时文件后改名，文档只会是旧版本或新版本
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .await
            .map_err(|e| StoreError::io(tmp_path.display().to_string(), e))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| StoreError::io(self.path.display().to_string(), e))?;
        Ok(())
    }
}

impl ProgressionStore for JsonFileStore {
    fn load_progression<'a>(
        &'a self,
        learner_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<ProgressionState>>> {
        async move {
            let _guard = self.lock.lock().await;
            let document = self.read_document().await?;
            Ok(document.progressions.get(learner_id).cloned())
        }
        .boxed()
    }

    fn save_progression<'a>(
        &'a self,
        state: &'a ProgressionState,
        expected_version: Option<u64>,
    ) -> BoxFuture<'a, StoreResult<ProgressionState>> {
        async move {
            let _guard = self.lock.lock().await;
            let mut document = self.read_document().await?;
            let actual = document.progressions.get(&state.learner_id).map(|s| s.version);

            if actual != expected_version {
                return Err(StoreError::VersionConflict {
                    learner_id: state.learner_id.clone(),
                    expected: expected_version,
                    actual,
                });
            }

            let mut stored = state.clone();
            stored.version = actual.map_or(1, |v| v + 1);
            document
                .progressions
                .insert(stored.learner_id.clone(), stored.clone());
            self.write_document(&document).await?;

            debug!(
                "已写入学员 {} 的成长状态 (版本 {})",
                stored.learner_id, stored.version
            );
            Ok(stored)
        }
        .boxed()
    }

    fn record_attempt<'a>(&'a self, summary: &'a AttemptSummary) -> BoxFuture<'a, StoreResult<()>> {
        async move {
            let _guard = self.lock.lock().await;
            let mut document = self.read_document().await?;
            document.attempts.push(summary.clone());
            self.write_document(&document).await
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progression.json");
        let store = JsonFileStore::new(&path);

        assert_eq!(store.load_progression("l1").await.unwrap(), None);

        let state = ProgressionState::first_award("l1", 30, Utc::now());
        let saved = store.save_progression(&state, None).await.unwrap();
        assert_eq!(saved.version, 1);

        // 新实例从同一个文件读取
        let reopened = JsonFileStore::new(&path);
        let loaded = reopened.load_progression("l1").await.unwrap().unwrap();
        assert_eq!(loaded, saved);

        let err = reopened.save_progression(&state, Some(7)).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_record_attempt_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("store.json"));
        let summary = AttemptSummary {
            quiz_id: "q".to_string(),
            learner_id: "l".to_string(),
            attempt_number: 1,
            percentage: 80,
            correct_count: 4,
            total_questions: 5,
            timed_out: false,
            completed_at: Utc::now(),
        };

        store.record_attempt(&summary).await.unwrap();
        store.record_attempt(&summary).await.unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        let document: StoreDocument = serde_json::from_str(&content).unwrap();
        assert_eq!(document.attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStore::new(&path).load_progression("l").await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
