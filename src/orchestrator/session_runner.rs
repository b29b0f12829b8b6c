//! 会话驱动器 - 编排层
//!
//! ## 职责
//!
//! 把两个事件源接到同一个状态机上：
//! 1. **学员输入**：`mpsc` 通道中的 `SessionEvent`
//! 2. **倒计时**：每个会话一个 `tokio::time::interval`，只在限时测验作答期间运行
//!
//! 谁先触发完成谁生效，重复触发由状态机忽略。
//! 输入通道关闭视为放弃作答，不写入任何持久化数据。

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::error::SessionError;
use crate::workflow::{AttemptCtx, QuizFlow, QuizSession, SessionEvent, Submission};

/// 会话结束方式
#[derive(Debug)]
pub enum SessionReport {
    /// 已提交（主动或超时）
    Completed(Submission),
    /// 提交前放弃
    Abandoned { answered: usize },
}

/// 展示层回调
pub trait SessionObserver {
    /// 事件被状态机接受后调用
    fn on_update(&mut self, session: &QuizSession, event: &SessionEvent);

    /// 事件被拒绝时调用
    fn on_rejected(&mut self, _session: &QuizSession, _error: &SessionError) {}
}

/// 不做任何展示
pub struct SilentObserver;

impl SessionObserver for SilentObserver {
    fn on_update(&mut self, _session: &QuizSession, _event: &SessionEvent) {}
}

/// 驱动一个会话直到提交或放弃
///
/// # 参数
/// - `flow`: 完成流程
/// - `session`: 会话（通常处于 NotStarted，等待输入中的 `Start`）
/// - `events`: 学员输入
/// - `tick_interval`: 倒计时节拍间隔，每个节拍计一秒
/// - `observer`: 展示层回调
pub async fn run_session<O: SessionObserver>(
    flow: &QuizFlow,
    session: &mut QuizSession,
    events: &mut mpsc::Receiver<SessionEvent>,
    tick_interval: Duration,
    observer: &mut O,
) -> SessionReport {
    let mut ticker = new_ticker(session, tick_interval);

    loop {
        let event = tokio::select! {
            _ = next_tick(&mut ticker) => SessionEvent::Tick,
            received = events.recv() => match received {
                Some(event) => event,
                None => {
                    let answered = session.answered_count();
                    info!(
                        "{} 输入已关闭，放弃本次作答 (已答 {} 题)",
                        AttemptCtx::from(&*session),
                        answered
                    );
                    return SessionReport::Abandoned { answered };
                }
            },
        };

        let was_running = session.is_in_progress();
        match flow.handle(session, event.clone()) {
            Ok(Some(submission)) => {
                observer.on_update(session, &event);
                return SessionReport::Completed(submission);
            }
            Ok(None) => {
                if !was_running && session.is_in_progress() {
                    ticker = new_ticker(session, tick_interval);
                }
                observer.on_update(session, &event);
            }
            Err(e) => {
                warn!("{} 操作被拒绝: {}", AttemptCtx::from(&*session), e);
                observer.on_rejected(session, &e);
            }
        }
    }
}

/// 只有限时且正在作答的会话才需要倒计时；第一个节拍在一个间隔之后
fn new_ticker(session: &QuizSession, tick_interval: Duration) -> Option<Interval> {
    if !session.is_in_progress() || session.remaining_seconds().is_none() {
        return None;
    }
    let mut ticker = interval_at(Instant::now() + tick_interval, tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
