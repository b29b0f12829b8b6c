//! 测验完成流程 - 流程层
//!
//! 核心职责：把事件交给会话状态机，并在进入终态时执行后续动作
//!
//! 流程顺序：
//! 1. 状态机同步计算得分（得分在这里就已确定）
//! 2. 后台写入作答历史
//! 3. 已审核测验：后台发放经验值，不等待结果
//!
//! 后台任务通过 `tokio::spawn` 启动，因此必须在 tokio 运行时内调用。

use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{AppError, ProgressionError, SessionError};
use crate::infrastructure::ProgressionStore;
use crate::models::ScoreResult;
use crate::services::progression::{AwardOutcome, ProgressionUpdater};
use crate::workflow::attempt_ctx::AttemptCtx;
use crate::workflow::session::{CompletionTrigger, QuizSession, SessionEvent, Transition};

/// 经验值发放凭据
#[derive(Debug)]
pub enum AwardTicket {
    /// 不发放（未审核测验或奖励为 0）
    NotEligible,
    /// 后台发放中
    Pending(JoinHandle<Result<AwardOutcome, ProgressionError>>),
}

impl AwardTicket {
    pub fn is_pending(&self) -> bool {
        matches!(self, AwardTicket::Pending(_))
    }

    /// 等待发放结果；不发放时返回 `None`
    pub async fn wait(self) -> Option<Result<AwardOutcome, AppError>> {
        match self {
            AwardTicket::NotEligible => None,
            AwardTicket::Pending(handle) => Some(match handle.await {
                Ok(result) => result.map_err(AppError::from),
                Err(e) => Err(AppError::Other(format!("经验值发放任务异常结束: {}", e))),
            }),
        }
    }
}

/// 一次提交的结果
#[derive(Debug)]
pub struct Submission {
    pub score: ScoreResult,
    pub trigger: CompletionTrigger,
    pub award: AwardTicket,
    /// 作答历史写入任务
    pub history: JoinHandle<()>,
}

/// 测验完成流程
///
/// - 不持有会话，会话由调用方（编排层）持有
/// - 只依赖业务能力（services）和存储接口
pub struct QuizFlow {
    updater: Arc<ProgressionUpdater>,
    store: Arc<dyn ProgressionStore>,
}

impl QuizFlow {
    pub fn new(updater: Arc<ProgressionUpdater>, store: Arc<dyn ProgressionStore>) -> Self {
        Self { updater, store }
    }

    pub fn updater(&self) -> &ProgressionUpdater {
        &self.updater
    }

    /// 处理一个事件；进入终态时返回 `Some(Submission)`，且只返回一次
    pub fn handle(
        &self,
        session: &mut QuizSession,
        event: SessionEvent,
    ) -> Result<Option<Submission>, SessionError> {
        match session.handle(event)? {
            Transition::Started => {
                info!(
                    "{} ▶ 开始作答，共 {} 道题",
                    AttemptCtx::from(&*session),
                    session.ordered_questions().len()
                );
                Ok(None)
            }
            Transition::Completed(completion) => {
                Ok(Some(self.on_completed(session, completion.score, completion.trigger)))
            }
            Transition::Updated | Transition::Ignored => Ok(None),
        }
    }

    fn on_completed(
        &self,
        session: &QuizSession,
        score: ScoreResult,
        trigger: CompletionTrigger,
    ) -> Submission {
        let ctx = AttemptCtx::from(session);
        match trigger {
            CompletionTrigger::Submitted => info!("{} ✓ 已提交，得分 {}", ctx, score),
            CompletionTrigger::TimedOut => info!("{} ⏰ 时间到，自动提交，得分 {}", ctx, score),
        }

        let history = self.spawn_record_attempt(session, trigger, &ctx);
        let award = self.spawn_award(session, &ctx);

        Submission {
            score,
            trigger,
            award,
            history,
        }
    }

    fn spawn_record_attempt(
        &self,
        session: &QuizSession,
        trigger: CompletionTrigger,
        ctx: &AttemptCtx,
    ) -> JoinHandle<()> {
        let summary = session.attempt_summary(trigger, Utc::now());
        let store = self.store.clone();
        let ctx = ctx.clone();

        tokio::spawn(async move {
            let Some(summary) = summary else {
                return;
            };
            if let Err(e) = store.record_attempt(&summary).await {
                warn!("{} ⚠️ 作答记录写入失败: {}", ctx, e);
            }
        })
    }

    fn spawn_award(&self, session: &QuizSession, ctx: &AttemptCtx) -> AwardTicket {
        if !session.is_verified() {
            info!("{} 测验未审核，不发放经验值", ctx);
            return AwardTicket::NotEligible;
        }
        if session.xp_reward() == 0 {
            warn!("{} 测验经验值奖励为 0，跳过发放", ctx);
            return AwardTicket::NotEligible;
        }

        let updater = self.updater.clone();
        let learner_id = session.learner_id().to_string();
        let xp_amount = i64::from(session.xp_reward());
        let ctx = ctx.clone();

        AwardTicket::Pending(tokio::spawn(async move {
            let result = updater.award(&learner_id, xp_amount, true).await;
            if let Err(e) = &result {
                error!("{} 经验值发放被拒绝: {}", ctx, e);
            }
            result
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InMemoryStore;
    use crate::models::question::{Answer, Question, QuestionKind};
    use crate::services::fallback_writer::FallbackWriter;
    use crate::services::progression::ProgressionSettings;
    use crate::workflow::session::SessionSettings;

    fn flow(store: Arc<InMemoryStore>) -> QuizFlow {
        let updater = ProgressionUpdater::new(
            store.clone(),
            Arc::new(FallbackWriter::in_memory()),
            ProgressionSettings::default(),
        );
        QuizFlow::new(Arc::new(updater), store)
    }

    fn session(is_verified: bool, xp_reward: u32) -> QuizSession {
        let question = Question {
            id: "q".to_string(),
            text: "1 + 1 = ?".to_string(),
            kind: QuestionKind::SingleSelect,
            display_order: 0,
            answers: vec![
                Answer {
                    id: "a".to_string(),
                    question_id: "q".to_string(),
                    text: "2".to_string(),
                    is_correct: true,
                    display_order: 0,
                },
                Answer {
                    id: "b".to_string(),
                    question_id: "q".to_string(),
                    text: "3".to_string(),
                    is_correct: false,
                    display_order: 1,
                },
            ],
        };
        QuizSession::new(
            "quiz",
            "learner",
            vec![question],
            SessionSettings {
                time_limit_secs: None,
                is_verified,
                xp_reward,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_verified_completion_awards_xp() {
        let store = Arc::new(InMemoryStore::new());
        let flow = flow(store.clone());
        let mut session = session(true, 40);

        assert!(flow.handle(&mut session, SessionEvent::Start).unwrap().is_none());
        flow.handle(&mut session, SessionEvent::SelectCurrent(0)).unwrap();
        let submission = flow
            .handle(&mut session, SessionEvent::Submit)
            .unwrap()
            .unwrap();

        assert_eq!(submission.score.percentage, 100);
        assert_eq!(submission.trigger, CompletionTrigger::Submitted);

        submission.history.await.unwrap();
        let outcome = submission.award.wait().await.unwrap().unwrap();
        assert!(outcome.is_persisted());
        assert_eq!(store.get("learner").await.unwrap().total_xp, 40);
        assert_eq!(store.attempts().await.len(), 1);

        // 重复提交不会再次触发
        assert!(flow.handle(&mut session, SessionEvent::Submit).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unverified_completion_never_awards() {
        let store = Arc::new(InMemoryStore::new());
        let flow = flow(store.clone());
        let mut session = session(false, 40);

        flow.handle(&mut session, SessionEvent::Start).unwrap();
        let submission = flow
            .handle(&mut session, SessionEvent::Submit)
            .unwrap()
            .unwrap();

        assert_eq!(submission.score.percentage, 0);
        assert!(!submission.award.is_pending());
        submission.history.await.unwrap();
        assert!(submission.award.wait().await.is_none());
        assert_eq!(store.get("learner").await, None);
        assert_eq!(store.attempts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_reward_is_not_sent() {
        let store = Arc::new(InMemoryStore::new());
        let flow = flow(store.clone());
        let mut session = session(true, 0);

        flow.handle(&mut session, SessionEvent::Start).unwrap();
        let submission = flow
            .handle(&mut session, SessionEvent::Submit)
            .unwrap()
            .unwrap();

        assert!(!submission.award.is_pending());
        assert_eq!(store.get("learner").await, None);
    }

    #[tokio::test]
    async fn test_store_outage_keeps_score() {
        let store = Arc::new(InMemoryStore::new());
        store.set_available(false);
        let flow = flow(store.clone());
        let mut session = session(true, 50);

        flow.handle(&mut session, SessionEvent::Start).unwrap();
        flow.handle(&mut session, SessionEvent::SelectCurrent(0)).unwrap();
        let submission = flow
            .handle(&mut session, SessionEvent::Submit)
            .unwrap()
            .unwrap();

        // 得分在等待发放结果之前就已确定
        assert_eq!(submission.score.percentage, 100);
        let outcome = submission.award.wait().await.unwrap().unwrap();
        assert_eq!(outcome.to_string(), "+50 XP（待同步）");
        assert_eq!(flow.updater().fallback().pending_count().await, 1);
    }
}
