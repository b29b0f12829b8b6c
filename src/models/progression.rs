use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 学员成长状态（持久化，每个学员一份）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionState {
    pub learner_id: String,
    pub total_xp: u64,
    pub level: u32,
    pub current_streak_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_quiz_timestamp: Option<DateTime<Utc>>,
    pub daily_xp: u64,
    pub weekly_xp: u64,
    /// 乐观并发版本号，由存储在每次写入时递增
    #[serde(default)]
    pub version: u64,
}

impl ProgressionState {
    /// 首次获得经验值时创建的记录
    pub fn first_award(learner_id: impl Into<String>, xp_amount: u64, now: DateTime<Utc>) -> Self {
        Self {
            learner_id: learner_id.into(),
            total_xp: xp_amount,
            level: 1,
            current_streak_days: 1,
            last_quiz_timestamp: Some(now),
            daily_xp: xp_amount,
            weekly_xp: xp_amount,
            version: 0,
        }
    }
}

/// 未同步的本地经验值记录
///
/// 存储不可用时由 FallbackWriter 生成，`synced` 始终为 false，
/// 之后需要与持久化存储对账
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAward {
    pub learner_id: String,
    pub xp_amount: u64,
    pub completed_quiz: bool,
    pub attempted_at: DateTime<Utc>,
    pub reason: String,
    pub synced: bool,
}
