//! 内存存储
//!
//! 用于演示和测试，支持模拟存储不可用和调用延迟

use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::infrastructure::store::ProgressionStore;
use crate::models::{AttemptSummary, ProgressionState};

#[derive(Default)]
pub struct InMemoryStore {
    progressions: Mutex<HashMap<String, ProgressionState>>,
    attempts: Mutex<Vec<AttemptSummary>>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一条成长状态（版本号保持传入值）
    pub async fn seed(&self, state: ProgressionState) {
        self.progressions
            .lock()
            .await
            .insert(state.learner_id.clone(), state);
    }

    /// 模拟存储宕机/恢复
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// 模拟每次调用的延迟
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn get(&self, learner_id: &str) -> Option<ProgressionState> {
        self.progressions.lock().await.get(learner_id).cloned()
    }

    pub async fn attempts(&self) -> Vec<AttemptSummary> {
        self.attempts.lock().await.clone()
    }

    async fn simulate(&self) -> StoreResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("内存存储已被设置为不可用".to_string()));
        }
        Ok(())
    }
}

impl ProgressionStore for InMemoryStore {
    fn load_progression<'a>(
        &'a self,
        learner_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<ProgressionState>>> {
        async move {
            self.simulate().await?;
            Ok(self.progressions.lock().await.get(learner_id).cloned())
        }
        .boxed()
    }

    fn save_progression<'a>(
        &'a self,
        state: &'a ProgressionState,
        expected_version: Option<u64>,
    ) -> BoxFuture<'a, StoreResult<ProgressionState>> {
        async move {
            self.simulate().await?;
            let mut progressions = self.progressions.lock().await;
            let actual = progressions.get(&state.learner_id).map(|s| s.version);

            if actual != expected_version {
                return Err(StoreError::VersionConflict {
                    learner_id: state.learner_id.clone(),
                    expected: expected_version,
                    actual,
                });
            }

            let mut stored = state.clone();
            stored.version = actual.map_or(1, |v| v + 1);
            progressions.insert(stored.learner_id.clone(), stored.clone());
            Ok(stored)
        }
        .boxed()
    }

    fn record_attempt<'a>(&'a self, summary: &'a AttemptSummary) -> BoxFuture<'a, StoreResult<()>> {
        async move {
            self.simulate().await?;
            self.attempts.lock().await.push(summary.clone());
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_conditional_save() {
        let store = InMemoryStore::new();
        let state = ProgressionState::first_award("l1", 10, Utc::now());

        let created = assert_ok!(store.save_progression(&state, None).await);
        assert_eq!(created.version, 1);

        // 记录已存在时不能再次按“新建”写入
        let err = assert_err!(store.save_progression(&state, None).await);
        assert!(err.is_conflict());

        // 过期版本被拒绝
        let mut stale = created.clone();
        stale.total_xp = 99;
        stale.version = 0;
        let err = assert_err!(store.save_progression(&stale, Some(0)).await);
        assert!(err.is_conflict());

        let updated = assert_ok!(store.save_progression(&created, Some(1)).await);
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = InMemoryStore::new();
        store.set_available(false);
        let err = assert_err!(store.load_progression("l1").await);
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.set_available(true);
        assert_eq!(assert_ok!(store.load_progression("l1").await), None);
    }
}
