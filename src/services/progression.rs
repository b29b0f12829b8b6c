//! 成长值更新服务 - 业务能力层
//!
//! 负责经验值、等级、连续天数以及日/周经验窗口的计算和持久化。
//!
//! ## 流程
//! 1. 读取学员状态，不存在时直接创建首条记录
//! 2. 纯函数 `apply_award` 计算新状态
//! 3. 按版本号条件写入，冲突时重新读取并重算（最多 `max_cas_retries` 次）
//! 4. 存储不可达、超时或重试耗尽时写入本地兜底记录
//!
//! 每次存储调用都有超时上限，不会无限期阻塞。

use chrono::{DateTime, Datelike, Duration as ChronoDuration, FixedOffset, NaiveDate, Offset, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ProgressionError, StoreError, StoreResult};
use crate::infrastructure::ProgressionStore;
use crate::models::{PendingAward, ProgressionState};
use crate::services::fallback_writer::FallbackWriter;

/// 奖励结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwardOutcome {
    /// 已写入持久化存储
    Persisted {
        xp_amount: u64,
        state: ProgressionState,
    },
    /// 存储失败，已记录到本地等待同步
    LocallyQueued(PendingAward),
}

impl AwardOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, AwardOutcome::Persisted { .. })
    }

    pub fn xp_amount(&self) -> u64 {
        match self {
            AwardOutcome::Persisted { xp_amount, .. } => *xp_amount,
            AwardOutcome::LocallyQueued(pending) => pending.xp_amount,
        }
    }
}

impl std::fmt::Display for AwardOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AwardOutcome::Persisted { xp_amount, state } => write!(
                f,
                "+{} XP (等级 {}, 连续 {} 天)",
                xp_amount, state.level, state.current_streak_days
            ),
            AwardOutcome::LocallyQueued(pending) => write!(f, "+{} XP（待同步）", pending.xp_amount),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressionSettings {
    pub store_timeout: Duration,
    pub max_cas_retries: u32,
    /// 自然日/周边界所在时区
    pub day_offset: FixedOffset,
}

impl ProgressionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            store_timeout: config.store_timeout(),
            max_cas_retries: config.max_cas_retries,
            day_offset: config.day_offset().unwrap_or_else(utc_offset),
        }
    }
}

impl Default for ProgressionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// 成长值更新服务
pub struct ProgressionUpdater {
    store: Arc<dyn ProgressionStore>,
    fallback: Arc<FallbackWriter>,
    settings: ProgressionSettings,
}

impl ProgressionUpdater {
    pub fn new(
        store: Arc<dyn ProgressionStore>,
        fallback: Arc<FallbackWriter>,
        settings: ProgressionSettings,
    ) -> Self {
        Self {
            store,
            fallback,
            settings,
        }
    }

    pub fn fallback(&self) -> &FallbackWriter {
        &self.fallback
    }

    /// 读取学员当前成长状态，与写入使用同一个超时上限
    pub async fn current(&self, learner_id: &str) -> StoreResult<Option<ProgressionState>> {
        self.bounded(self.store.load_progression(learner_id)).await
    }

    /// 发放经验值（使用当前时间）
    pub async fn award(
        &self,
        learner_id: &str,
        xp_amount: i64,
        completed_quiz: bool,
    ) -> Result<AwardOutcome, ProgressionError> {
        self.award_at(learner_id, xp_amount, completed_quiz, Utc::now())
            .await
    }

    /// 发放经验值
    ///
    /// 非正数经验值是调用方错误，直接拒绝；存储失败不会返回错误，
    /// 而是返回 `AwardOutcome::LocallyQueued`
    pub async fn award_at(
        &self,
        learner_id: &str,
        xp_amount: i64,
        completed_quiz: bool,
        now: DateTime<Utc>,
    ) -> Result<AwardOutcome, ProgressionError> {
        if xp_amount <= 0 {
            return Err(ProgressionError::InvalidXpAmount(xp_amount));
        }
        let xp = xp_amount as u64;

        match self.persist(learner_id, xp, completed_quiz, now).await {
            Ok(state) => {
                info!(
                    "✓ 学员 {} +{} XP, 总计 {} XP, 等级 {}, 连续 {} 天",
                    learner_id, xp, state.total_xp, state.level, state.current_streak_days
                );
                Ok(AwardOutcome::Persisted {
                    xp_amount: xp,
                    state,
                })
            }
            Err(e) => {
                warn!(
                    "⚠️ 学员 {} 的 +{} XP 未能写入存储，转为本地记录等待同步: {}",
                    learner_id, xp, e
                );
                let pending = self
                    .fallback
                    .record(PendingAward {
                        learner_id: learner_id.to_string(),
                        xp_amount: xp,
                        completed_quiz,
                        attempted_at: now,
                        reason: e.to_string(),
                        synced: false,
                    })
                    .await;
                Ok(AwardOutcome::LocallyQueued(pending))
            }
        }
    }

    async fn persist(
        &self,
        learner_id: &str,
        xp: u64,
        completed_quiz: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<ProgressionState> {
        let mut retries = 0;

        loop {
            let current = self.bounded(self.store.load_progression(learner_id)).await?;

            let (next, expected_version) = match &current {
                None => (ProgressionState::first_award(learner_id, xp, now), None),
                Some(prev) => (
                    apply_award(prev, xp, completed_quiz, now, self.settings.day_offset),
                    Some(prev.version),
                ),
            };

            match self
                .bounded(self.store.save_progression(&next, expected_version))
                .await
            {
                Ok(saved) => return Ok(saved),
                Err(e) if e.is_conflict() && retries < self.settings.max_cas_retries => {
                    retries += 1;
                    debug!(
                        "学员 {} 写入冲突，重新读取后重试 ({}/{})",
                        learner_id, retries, self.settings.max_cas_retries
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match tokio::time::timeout(self.settings.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                timeout_ms: self.settings.store_timeout.as_millis() as u64,
            }),
        }
    }
}

/// 等级 = floor(sqrt(总经验 / 100)) + 1
pub fn level_for_xp(total_xp: u64) -> u32 {
    (integer_sqrt(total_xp / 100) + 1) as u32
}

fn integer_sqrt(n: u64) -> u64 {
    let mut root = (n as f64).sqrt() as u64;
    while root * root > n {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    root
}

/// 在已有状态上叠加一次奖励（纯函数）
///
/// 版本号保持不变，由存储在写入时递增
pub fn apply_award(
    prev: &ProgressionState,
    xp: u64,
    completed_quiz: bool,
    now: DateTime<Utc>,
    day_offset: FixedOffset,
) -> ProgressionState {
    let today = calendar_day(now, day_offset);
    let last_day = prev.last_quiz_timestamp.map(|t| calendar_day(t, day_offset));

    let mut next = prev.clone();
    next.total_xp = prev.total_xp.saturating_add(xp);
    next.level = level_for_xp(next.total_xp);

    if completed_quiz {
        if let Some(last_day) = last_day {
            match (today - last_day).num_days() {
                1 => next.current_streak_days = prev.current_streak_days.saturating_add(1),
                gap if gap > 1 => next.current_streak_days = 1,
                // 同一天，或者时钟偏差导致的“未来”日期
                _ => {}
            }
        }
    }

    let daily_base = match last_day {
        Some(day) if day >= today => prev.daily_xp,
        _ => 0,
    };
    next.daily_xp = daily_base.saturating_add(xp);

    let weekly_base = match last_day {
        Some(day) if day >= week_start(today) => prev.weekly_xp,
        _ => 0,
    };
    next.weekly_xp = weekly_base.saturating_add(xp);

    next.last_quiz_timestamp = Some(now);
    next
}

fn calendar_day(timestamp: DateTime<Utc>, day_offset: FixedOffset) -> NaiveDate {
    timestamp.with_timezone(&day_offset).date_naive()
}

/// 一周从周一开始
fn week_start(day: NaiveDate) -> NaiveDate {
    day - ChronoDuration::days(day.weekday().num_days_from_monday() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InMemoryStore;
    use chrono::TimeZone;
    use futures::future::{BoxFuture, FutureExt};
    use tokio_test::{assert_err, assert_ok};

    use crate::models::AttemptSummary;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn state(total_xp: u64, streak: u32, last: DateTime<Utc>) -> ProgressionState {
        ProgressionState {
            learner_id: "l1".to_string(),
            total_xp,
            level: level_for_xp(total_xp),
            current_streak_days: streak,
            last_quiz_timestamp: Some(last),
            daily_xp: 40,
            weekly_xp: 120,
            version: 3,
        }
    }

    fn updater(store: Arc<dyn ProgressionStore>) -> ProgressionUpdater {
        ProgressionUpdater::new(
            store,
            Arc::new(FallbackWriter::in_memory()),
            ProgressionSettings {
                store_timeout: Duration::from_millis(200),
                max_cas_retries: 3,
                day_offset: utc_offset(),
            },
        )
    }

    #[test]
    fn test_level_curve() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(399), 2);
        assert_eq!(level_for_xp(400), 3);
        assert_eq!(level_for_xp(450), 3);
        assert_eq!(level_for_xp(500), 3);
        assert_eq!(level_for_xp(900), 4);
        assert_eq!(level_for_xp(1_000_000), 101);
    }

    #[test]
    fn test_level_is_monotonic() {
        let mut previous = level_for_xp(0);
        for xp in (0..50_000u64).step_by(7) {
            let level = level_for_xp(xp);
            assert!(level >= previous, "xp {} 等级回退", xp);
            previous = level;
        }
    }

    #[test]
    fn test_streak_continues_from_yesterday() {
        let prev = state(200, 4, at(2026, 3, 4, 22));
        let next = apply_award(&prev, 10, true, at(2026, 3, 5, 8), utc_offset());

        assert_eq!(next.current_streak_days, 5);
        assert_eq!(next.total_xp, 210);
        assert_eq!(next.last_quiz_timestamp, Some(at(2026, 3, 5, 8)));
        assert_eq!(next.version, prev.version);
    }

    #[test]
    fn test_streak_resets_after_gap() {
        let prev = state(200, 9, at(2026, 3, 1, 12));
        let next = apply_award(&prev, 10, true, at(2026, 3, 6, 12), utc_offset());
        assert_eq!(next.current_streak_days, 1);
    }

    #[test]
    fn test_same_day_does_not_inflate_streak() {
        let prev = state(200, 2, at(2026, 3, 5, 1));
        let next = apply_award(&prev, 10, true, at(2026, 3, 5, 23), utc_offset());
        assert_eq!(next.current_streak_days, 2);
        assert_eq!(next.daily_xp, 50);
    }

    #[test]
    fn test_not_completed_leaves_streak_alone() {
        let prev = state(200, 9, at(2026, 3, 1, 12));
        let next = apply_award(&prev, 10, false, at(2026, 3, 6, 12), utc_offset());
        assert_eq!(next.current_streak_days, 9);
        assert_eq!(next.total_xp, 210);
    }

    #[test]
    fn test_daily_and_weekly_windows() {
        // 2026-03-04 是周三，2026-03-09 是周一
        let prev = state(200, 1, at(2026, 3, 4, 10));

        let thursday = apply_award(&prev, 10, true, at(2026, 3, 5, 10), utc_offset());
        assert_eq!(thursday.daily_xp, 10);
        assert_eq!(thursday.weekly_xp, 130);

        let next_monday = apply_award(&thursday, 5, true, at(2026, 3, 9, 0), utc_offset());
        assert_eq!(next_monday.daily_xp, 5);
        assert_eq!(next_monday.weekly_xp, 5);
    }

    #[test]
    fn test_day_boundary_uses_configured_offset() {
        // UTC 17:00 在 +08:00 已经是第二天 01:00
        let prev = state(0, 3, at(2026, 3, 1, 17));
        let now = at(2026, 3, 2, 2);

        let utc = apply_award(&prev, 10, true, now, utc_offset());
        assert_eq!(utc.current_streak_days, 4);

        let beijing = FixedOffset::east_opt(8 * 3600).unwrap();
        let local = apply_award(&prev, 10, true, now, beijing);
        assert_eq!(local.current_streak_days, 3);
        assert_eq!(local.daily_xp, 50);
    }

    #[tokio::test]
    async fn test_first_award_creates_record() {
        let store = Arc::new(InMemoryStore::new());
        let updater = updater(store.clone());
        let now = at(2026, 3, 5, 9);

        let outcome = assert_ok!(updater.award_at("new", 500, true, now).await);

        let AwardOutcome::Persisted { state, .. } = outcome else {
            panic!("应该写入存储");
        };
        // 首条记录固定为 1 级，等级从下一次奖励开始按总经验计算
        assert_eq!(state.total_xp, 500);
        assert_eq!(state.level, 1);
        assert_eq!(state.current_streak_days, 1);
        assert_eq!(state.daily_xp, 500);
        assert_eq!(state.weekly_xp, 500);
        assert_eq!(state.last_quiz_timestamp, Some(now));
        assert_eq!(store.get("new").await, Some(state));
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_is_bounded_by_store_timeout() {
        let store = Arc::new(InMemoryStore::new());
        store.seed(state(300, 2, at(2026, 3, 4, 9))).await;
        let updater = updater(store.clone());

        let loaded = assert_ok!(updater.current("l1").await);
        assert_eq!(loaded.map(|s| s.total_xp), Some(300));

        store.set_latency(Duration::from_secs(5));
        let err = assert_err!(updater.current("l1").await);
        assert!(matches!(err, StoreError::Timeout { timeout_ms: 200 }));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_xp() {
        let store = Arc::new(InMemoryStore::new());
        let updater = updater(store.clone());

        let err = assert_err!(updater.award("l1", 0, true).await);
        assert_eq!(err, ProgressionError::InvalidXpAmount(0));
        assert_err!(updater.award("l1", -5, true).await);
        assert_eq!(store.get("l1").await, None);
        assert_eq!(updater.fallback().pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_unavailable_store_falls_back_locally() {
        let store = Arc::new(InMemoryStore::new());
        store.set_available(false);
        let updater = updater(store.clone());

        let outcome = assert_ok!(updater.award("l1", 50, true).await);

        assert!(!outcome.is_persisted());
        assert_eq!(outcome.to_string(), "+50 XP（待同步）");
        let pending = updater.fallback().pending().await;
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].synced);
        assert_eq!(pending[0].xp_amount, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out_into_fallback() {
        let store = Arc::new(InMemoryStore::new());
        store.set_latency(Duration::from_secs(5));
        let updater = updater(store.clone());

        let outcome = assert_ok!(updater.award("l1", 10, true).await);

        let AwardOutcome::LocallyQueued(pending) = outcome else {
            panic!("超时应该转为本地记录");
        };
        assert!(pending.reason.contains("超时"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_awards_do_not_lose_increments() {
        let store = Arc::new(InMemoryStore::new());
        store.seed(state(100, 1, at(2026, 3, 5, 8))).await;
        store.set_latency(Duration::from_millis(10));
        let updater = updater(store.clone());
        let now = at(2026, 3, 5, 9);

        let (a, b) = tokio::join!(
            updater.award_at("l1", 30, true, now),
            updater.award_at("l1", 70, true, now),
        );

        assert!(assert_ok!(a).is_persisted());
        assert!(assert_ok!(b).is_persisted());
        let stored = store.get("l1").await.unwrap();
        assert_eq!(stored.total_xp, 200);
        assert_eq!(stored.daily_xp, 140);
        assert_eq!(stored.version, 5);
    }

    /// 每次写入都报告冲突的存储
    struct AlwaysConflicting;

    impl ProgressionStore for AlwaysConflicting {
        fn load_progression<'a>(
            &'a self,
            _learner_id: &'a str,
        ) -> BoxFuture<'a, StoreResult<Option<ProgressionState>>> {
            async move { Ok(None) }.boxed()
        }

        fn save_progression<'a>(
            &'a self,
            state: &'a ProgressionState,
            expected_version: Option<u64>,
        ) -> BoxFuture<'a, StoreResult<ProgressionState>> {
            async move {
                Err(StoreError::VersionConflict {
                    learner_id: state.learner_id.clone(),
                    expected: expected_version,
                    actual: Some(1),
                })
            }
            .boxed()
        }

        fn record_attempt<'a>(
            &'a self,
            _summary: &'a AttemptSummary,
        ) -> BoxFuture<'a, StoreResult<()>> {
            async move { Ok(()) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_exhausted_retries_fall_back() {
        let updater = updater(Arc::new(AlwaysConflicting));

        let outcome = assert_ok!(updater.award("l1", 15, true).await);

        assert!(matches!(outcome, AwardOutcome::LocallyQueued(_)));
        assert_eq!(updater.fallback().pending_count().await, 1);
    }
}
