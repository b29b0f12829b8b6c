//! 作答上下文
//!
//! 封装"哪个学员在做哪份测验的第几次作答"这一信息，主要用于日志前缀

use std::fmt::Display;

use crate::workflow::session::QuizSession;

/// 作答上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptCtx {
    /// 测验ID
    pub quiz_id: String,

    /// 学员ID
    pub learner_id: String,

    /// 第几次作答（从1开始）
    pub attempt_number: u32,
}

impl AttemptCtx {
    pub fn new(quiz_id: String, learner_id: String, attempt_number: u32) -> Self {
        Self {
            quiz_id,
            learner_id,
            attempt_number,
        }
    }
}

impl From<&QuizSession> for AttemptCtx {
    fn from(session: &QuizSession) -> Self {
        Self::new(
            session.quiz_id().to_string(),
            session.learner_id().to_string(),
            session.attempt_number(),
        )
    }
}

impl Display for AttemptCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[测验 {} 学员 {} 第{}次]",
            self.quiz_id, self.learner_id, self.attempt_number
        )
    }
}
