//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：日志文件、成长值存储、兜底写入、完成流程
//! 2. **加载测验**：扫描测验目录并选择要作答的测验
//! 3. **作答循环**：驱动会话、展示得分与经验值结果、支持重做
//! 4. **全局统计**：输出完成/放弃/待同步数量

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::{JsonFileStore, ProgressionStore};
use crate::models::{load_all_quizzes, QuizDefinition};
use crate::orchestrator::session_runner::{run_session, SessionReport};
use crate::orchestrator::terminal::{render_score, spawn_stdin_reader, TerminalObserver};
use crate::services::fallback_writer::FallbackWriter;
use crate::services::progression::{ProgressionSettings, ProgressionUpdater};
use crate::utils::logging;
use crate::workflow::{QuizFlow, QuizSession, SessionEvent};

/// 应用主结构
pub struct App {
    config: Config,
    flow: QuizFlow,
}

/// 运行统计
#[derive(Debug, Default)]
struct RunStats {
    completed: usize,
    abandoned: usize,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::init_log_file(&config.output_log_file)
            .with_context(|| format!("无法写入日志文件: {}", config.output_log_file))?;
        logging::log_startup(&config);

        let store: Arc<dyn ProgressionStore> = Arc::new(JsonFileStore::new(&config.store_path));
        let fallback = Arc::new(match config.fallback_path() {
            Some(path) => FallbackWriter::with_path(path),
            None => FallbackWriter::in_memory(),
        });
        let updater = Arc::new(ProgressionUpdater::new(
            store.clone(),
            fallback,
            ProgressionSettings::from_config(&config),
        ));

        Ok(Self {
            flow: QuizFlow::new(updater, store),
            config,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        info!("\n📁 正在扫描测验目录...");
        let quizzes = load_all_quizzes(&self.config.quiz_folder).await?;
        if quizzes.is_empty() {
            warn!("⚠️ 没有找到测验文件，程序结束");
            return Ok(());
        }
        logging::log_quizzes_loaded(quizzes.len());

        let quiz = select_quiz(&quizzes, self.config.quiz_id.as_deref())?;
        let mut session = QuizSession::from_definition(
            quiz,
            self.config.learner_id.as_str(),
            self.config.default_xp_reward,
        )
        .with_context(|| format!("无法开始测验: {}", quiz.id))?;

        self.print_progression().await;
        self.print_intro(quiz, &session);

        let mut events = spawn_stdin_reader();
        let mut stats = RunStats::default();

        loop {
            let report = run_session(
                &self.flow,
                &mut session,
                &mut events,
                self.config.tick_interval(),
                &mut TerminalObserver,
            )
            .await;

            match report {
                SessionReport::Abandoned { answered } => {
                    println!("已放弃本次作答（已答 {} 题），不记录成绩", answered);
                    stats.abandoned += 1;
                    break;
                }
                SessionReport::Completed(submission) => {
                    stats.completed += 1;
                    // 得分先展示，经验值结果随后到达
                    render_score(&session, &submission.score);
                    match submission.award.wait().await {
                        None => println!("本测验未审核，不计经验值"),
                        Some(Ok(outcome)) => println!("🎉 {}", outcome),
                        Some(Err(e)) => println!("⚠️ 经验值发放失败: {}", e),
                    }
                    if let Err(e) = submission.history.await {
                        warn!("作答记录任务异常结束: {}", e);
                    }
                }
            }

            println!("\n按回车重做本测验，输入 q 退出");
            if !wait_for_retake(&mut events).await {
                break;
            }
            session = session.retake();
        }

        logging::print_final_stats(
            stats.completed,
            stats.abandoned,
            self.flow.updater().fallback().pending_count().await,
            &self.config.output_log_file,
        );
        Ok(())
    }

    /// 展示当前成长状态（受存储超时约束，读取失败不影响作答）
    async fn print_progression(&self) {
        match self.flow.updater().current(&self.config.learner_id).await {
            Ok(Some(state)) => println!(
                "👤 {}  等级 {}  总经验 {}  连续 {} 天  今日 {}  本周 {}",
                state.learner_id,
                state.level,
                state.total_xp,
                state.current_streak_days,
                state.daily_xp,
                state.weekly_xp
            ),
            Ok(None) => println!("👤 {}  还没有经验值记录", self.config.learner_id),
            Err(e) => warn!("⚠️ 读取成长状态失败: {}", e),
        }
    }

    fn print_intro(&self, quiz: &QuizDefinition, session: &QuizSession) {
        println!("\n📝 {} ({})", quiz.title, quiz.id);
        if session.dropped_count() > 0 {
            println!(
                "⚠️ 有 {} 道题目格式错误未能加载，本次共 {} 道题",
                session.dropped_count(),
                quiz.questions.len() - session.dropped_count()
            );
        }
        match session.time_limit_secs() {
            Some(secs) => println!("⏱ 限时 {} 秒", secs),
            None => println!("⏱ 不限时"),
        }
        println!("按回车开始");
    }
}

/// 按 id 选择测验，未指定时使用第一个
fn select_quiz<'a>(
    quizzes: &'a [QuizDefinition],
    quiz_id: Option<&str>,
) -> Result<&'a QuizDefinition> {
    match quiz_id {
        Some(id) => quizzes
            .iter()
            .find(|q| q.id == id)
            .with_context(|| format!("找不到测验: {}", id)),
        None => quizzes.first().context("测验列表为空"),
    }
}

/// 等待重做指令；其他输入继续等待，输入关闭时返回 false
async fn wait_for_retake(events: &mut tokio::sync::mpsc::Receiver<SessionEvent>) -> bool {
    while let Some(event) = events.recv().await {
        if event == SessionEvent::Start {
            return true;
        }
        println!("按回车重做本测验，输入 q 退出");
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(id: &str) -> QuizDefinition {
        QuizDefinition {
            id: id.to_string(),
            title: id.to_uppercase(),
            time_limit_secs: None,
            is_verified: true,
            xp_reward: None,
            questions: Vec::new(),
            file_path: None,
        }
    }

    #[test]
    fn test_select_quiz() {
        let quizzes = vec![quiz("a"), quiz("b")];
        assert_eq!(select_quiz(&quizzes, None).unwrap().id, "a");
        assert_eq!(select_quiz(&quizzes, Some("b")).unwrap().id, "b");
        assert!(select_quiz(&quizzes, Some("c")).is_err());
    }

    #[tokio::test]
    async fn test_wait_for_retake() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        tx.send(SessionEvent::Next).await.unwrap();
        tx.send(SessionEvent::Start).await.unwrap();
        assert!(wait_for_retake(&mut rx).await);

        drop(tx);
        assert!(!wait_for_retake(&mut rx).await);
    }
}
