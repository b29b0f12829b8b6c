use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::question::QuestionId;

/// 评分结果，计算后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// 百分制得分 0..=100
    pub percentage: u8,
    pub per_question_correctness: BTreeMap<QuestionId, bool>,
}

impl ScoreResult {
    pub fn correct_count(&self) -> usize {
        self.per_question_correctness.values().filter(|c| **c).count()
    }

    pub fn total_questions(&self) -> usize {
        self.per_question_correctness.len()
    }

    pub fn is_correct(&self, question_id: &str) -> Option<bool> {
        self.per_question_correctness.get(question_id).copied()
    }
}

impl std::fmt::Display for ScoreResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}% ({}/{})",
            self.percentage,
            self.correct_count(),
            self.total_questions()
        )
    }
}
