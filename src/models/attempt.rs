use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 作答记录摘要，提交后写入作答历史
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub quiz_id: String,
    pub learner_id: String,
    pub attempt_number: u32,
    pub percentage: u8,
    pub correct_count: usize,
    pub total_questions: usize,
    /// 是否因倒计时结束而强制提交
    pub timed_out: bool,
    pub completed_at: DateTime<Utc>,
}
