//! 作答会话状态机 - 流程层
//!
//! 状态：`NotStarted → InProgress → Completed`，`Completed` 为终态。
//!
//! 学员操作和倒计时节拍都是同一个状态机的事件，
//! 进入 `Completed` 只会发生一次，之后的提交/节拍一律忽略。

use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::models::question::{Question, QuestionKind};
use crate::models::{AttemptSummary, QuizDefinition, ScoreResult};
use crate::services::normalizer;
use crate::services::scorer::{self, Selections};
use crate::services::sequencer;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    InProgress,
    Completed,
}

/// 会话事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// 开始作答
    Start,
    Next,
    Previous,
    /// 跳转到指定题目（从 0 开始）
    GoTo(usize),
    /// 选择/取消选择某道题的某个选项
    Select {
        question_id: String,
        answer_id: String,
    },
    /// 选择当前题目的第 k 个选项（从 0 开始）
    SelectCurrent(usize),
    /// 学员主动提交
    Submit,
    /// 倒计时节拍，每次计一秒
    Tick,
}

impl SessionEvent {
    fn action(&self) -> &'static str {
        match self {
            SessionEvent::Start => "开始",
            SessionEvent::Next | SessionEvent::Previous | SessionEvent::GoTo(_) => "切换题目",
            SessionEvent::Select { .. } | SessionEvent::SelectCurrent(_) => "作答",
            SessionEvent::Submit => "提交",
            SessionEvent::Tick => "倒计时",
        }
    }
}

/// 完成方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTrigger {
    Submitted,
    TimedOut,
}

/// 一次完成的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub score: ScoreResult,
    pub trigger: CompletionTrigger,
}

/// 事件处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// 进入作答状态
    Started,
    /// 导航、作答或倒计时更新，状态不变
    Updated,
    /// 进入终态，得分已确定
    Completed(Completion),
    /// 重复的开始/提交/节拍，被忽略
    Ignored,
}

/// 会话设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// 时间限制（秒），为空或 0 表示不限时
    pub time_limit_secs: Option<u64>,
    pub is_verified: bool,
    pub xp_reward: u32,
}

/// 提供给展示层的只读视图
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub state: SessionState,
    pub current_index: usize,
    pub total: usize,
    pub current_question: Option<&'a Question>,
    pub remaining_seconds: Option<u64>,
    pub answered_count: usize,
}

/// 单次作答会话（只在内存中，提交或放弃后销毁）
#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz_id: String,
    learner_id: String,
    attempt_number: u32,
    question_pool: Vec<Question>,
    dropped: usize,
    ordered_questions: Vec<Question>,
    current_index: usize,
    selections: Selections,
    state: SessionState,
    settings: SessionSettings,
    remaining_seconds: Option<u64>,
    score: Option<ScoreResult>,
}

impl QuizSession {
    /// 使用已规范化的题目创建会话
    pub fn new(
        quiz_id: impl Into<String>,
        learner_id: impl Into<String>,
        questions: Vec<Question>,
        settings: SessionSettings,
    ) -> Result<Self, SessionError> {
        Self::with_dropped(quiz_id.into(), learner_id.into(), questions, 0, settings)
    }

    /// 从测验定义创建会话：规范化原始题目，丢弃的题目只计数
    pub fn from_definition(
        quiz: &QuizDefinition,
        learner_id: impl Into<String>,
        default_xp_reward: u32,
    ) -> Result<Self, SessionError> {
        let outcome = normalizer::normalize(&quiz.questions);
        if outcome.is_degraded() {
            warn!(
                "⚠️ 测验 {} 有 {} 道题目格式错误已被丢弃，剩余 {} 道",
                quiz.id,
                outcome.dropped,
                outcome.questions.len()
            );
        }

        Self::with_dropped(
            quiz.id.clone(),
            learner_id.into(),
            outcome.questions,
            outcome.dropped,
            SessionSettings {
                time_limit_secs: quiz.time_limit_secs,
                is_verified: quiz.is_verified,
                xp_reward: quiz.xp_reward_or(default_xp_reward),
            },
        )
    }

    fn with_dropped(
        quiz_id: String,
        learner_id: String,
        questions: Vec<Question>,
        dropped: usize,
        mut settings: SessionSettings,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::NoPlayableQuestions { quiz_id, dropped });
        }
        settings.time_limit_secs = settings.time_limit_secs.filter(|secs| *secs > 0);

        Ok(Self {
            quiz_id,
            learner_id,
            attempt_number: 1,
            question_pool: questions,
            dropped,
            ordered_questions: Vec::new(),
            current_index: 0,
            selections: Selections::new(),
            state: SessionState::NotStarted,
            settings,
            remaining_seconds: None,
            score: None,
        })
    }

    /// 重做：全新的会话，不继承任何作答状态
    pub fn retake(&self) -> Self {
        Self {
            quiz_id: self.quiz_id.clone(),
            learner_id: self.learner_id.clone(),
            attempt_number: self.attempt_number + 1,
            question_pool: self.question_pool.clone(),
            dropped: self.dropped,
            ordered_questions: Vec::new(),
            current_index: 0,
            selections: Selections::new(),
            state: SessionState::NotStarted,
            settings: self.settings,
            remaining_seconds: None,
            score: None,
        }
    }

    /// 处理一个事件
    pub fn handle(&mut self, event: SessionEvent) -> Result<Transition, SessionError> {
        match (self.state, event) {
            (SessionState::NotStarted, SessionEvent::Start) => {
                self.start();
                Ok(Transition::Started)
            }
            (SessionState::InProgress, SessionEvent::Start)
            | (SessionState::NotStarted, SessionEvent::Tick)
            | (SessionState::Completed, SessionEvent::Submit)
            | (SessionState::Completed, SessionEvent::Tick) => Ok(Transition::Ignored),

            (SessionState::InProgress, SessionEvent::Next) => {
                self.current_index = (self.current_index + 1).min(self.max_index());
                Ok(Transition::Updated)
            }
            (SessionState::InProgress, SessionEvent::Previous) => {
                self.current_index = self.current_index.saturating_sub(1);
                Ok(Transition::Updated)
            }
            (SessionState::InProgress, SessionEvent::GoTo(index)) => {
                if index > self.max_index() {
                    return Err(SessionError::IndexOutOfRange {
                        index,
                        max_index: self.max_index(),
                    });
                }
                self.current_index = index;
                Ok(Transition::Updated)
            }
            (
                SessionState::InProgress,
                SessionEvent::Select {
                    question_id,
                    answer_id,
                },
            ) => {
                self.select(&question_id, &answer_id)?;
                Ok(Transition::Updated)
            }
            (SessionState::InProgress, SessionEvent::SelectCurrent(answer_index)) => {
                let question = &self.ordered_questions[self.current_index];
                let answer = question.answers.get(answer_index).ok_or_else(|| {
                    SessionError::IndexOutOfRange {
                        index: answer_index,
                        max_index: question.answers.len().saturating_sub(1),
                    }
                })?;
                let (question_id, answer_id) = (question.id.clone(), answer.id.clone());
                self.select(&question_id, &answer_id)?;
                Ok(Transition::Updated)
            }
            (SessionState::InProgress, SessionEvent::Submit) => {
                Ok(Transition::Completed(self.complete(CompletionTrigger::Submitted)))
            }
            (SessionState::InProgress, SessionEvent::Tick) => self.tick(),

            (state, event) => Err(SessionError::InvalidState {
                action: event.action(),
                state,
            }),
        }
    }

    fn start(&mut self) {
        self.ordered_questions = sequencer::shuffle(self.question_pool.clone());
        self.current_index = 0;
        self.remaining_seconds = self.settings.time_limit_secs;
        self.state = SessionState::InProgress;
        debug!(
            "测验 {} 开始，共 {} 道题，限时 {:?} 秒",
            self.quiz_id,
            self.ordered_questions.len(),
            self.remaining_seconds
        );
    }

    fn select(&mut self, question_id: &str, answer_id: &str) -> Result<(), SessionError> {
        let question = self
            .ordered_questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| SessionError::UnknownQuestion {
                question_id: question_id.to_string(),
            })?;

        if !question.has_answer(answer_id) {
            return Err(SessionError::UnknownAnswer {
                question_id: question_id.to_string(),
                answer_id: answer_id.to_string(),
            });
        }

        let kind = question.kind;
        let picked = self.selections.entry(question_id.to_string()).or_default();
        match kind {
            QuestionKind::SingleSelect => {
                picked.clear();
                picked.insert(answer_id.to_string());
            }
            QuestionKind::MultiSelect => {
                if !picked.remove(answer_id) {
                    picked.insert(answer_id.to_string());
                }
            }
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<Transition, SessionError> {
        let Some(remaining) = self.remaining_seconds else {
            return Ok(Transition::Ignored);
        };

        let remaining = remaining.saturating_sub(1);
        self.remaining_seconds = Some(remaining);
        if remaining == 0 {
            // 超时强制提交，和主动提交走同一条路径
            return Ok(Transition::Completed(self.complete(CompletionTrigger::TimedOut)));
        }
        Ok(Transition::Updated)
    }

    fn complete(&mut self, trigger: CompletionTrigger) -> Completion {
        let score = scorer::score(&self.ordered_questions, &self.selections);
        self.state = SessionState::Completed;
        self.score = Some(score.clone());
        Completion { score, trigger }
    }

    fn max_index(&self) -> usize {
        self.ordered_questions.len().saturating_sub(1)
    }

    // ========== 只读访问 ==========

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            state: self.state,
            current_index: self.current_index,
            total: self.ordered_questions.len(),
            current_question: self.ordered_questions.get(self.current_index),
            remaining_seconds: self.remaining_seconds,
            answered_count: self.answered_count(),
        }
    }

    pub fn answered_count(&self) -> usize {
        self.ordered_questions
            .iter()
            .filter(|q| self.selections.get(&q.id).is_some_and(|s| !s.is_empty()))
            .count()
    }

    pub fn selected(&self, question_id: &str) -> Option<&BTreeSet<String>> {
        self.selections.get(question_id)
    }

    /// 作答记录摘要，只有完成后才有
    pub fn attempt_summary(
        &self,
        trigger: CompletionTrigger,
        completed_at: chrono::DateTime<chrono::Utc>,
    ) -> Option<AttemptSummary> {
        let score = self.score.as_ref()?;
        Some(AttemptSummary {
            quiz_id: self.quiz_id.clone(),
            learner_id: self.learner_id.clone(),
            attempt_number: self.attempt_number,
            percentage: score.percentage,
            correct_count: score.correct_count(),
            total_questions: score.total_questions(),
            timed_out: trigger == CompletionTrigger::TimedOut,
            completed_at,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_in_progress(&self) -> bool {
        self.state == SessionState::InProgress
    }

    pub fn quiz_id(&self) -> &str {
        &self.quiz_id
    }

    pub fn learner_id(&self) -> &str {
        &self.learner_id
    }

    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    pub fn ordered_questions(&self) -> &[Question] {
        &self.ordered_questions
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped
    }

    pub fn is_verified(&self) -> bool {
        self.settings.is_verified
    }

    pub fn xp_reward(&self) -> u32 {
        self.settings.xp_reward
    }

    pub fn time_limit_secs(&self) -> Option<u64> {
        self.settings.time_limit_secs
    }

    pub fn remaining_seconds(&self) -> Option<u64> {
        self.remaining_seconds
    }

    pub fn score(&self) -> Option<&ScoreResult> {
        self.score.as_ref()
    }
}
