//! 终端展示层
//!
//! 把键盘输入翻译成 `SessionEvent`，并把会话视图渲染到标准输出

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::SessionError;
use crate::models::ScoreResult;
use crate::orchestrator::session_runner::SessionObserver;
use crate::utils::truncate_text;
use crate::workflow::{QuizSession, SessionEvent, SessionState};

/// 解析后的输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    Event(SessionEvent),
    Quit,
}

const HELP: &str = "命令: 数字=选择选项  n=下一题  p=上一题  g <题号>=跳转  submit=提交  q=退出";

/// 解析一行输入，无法识别时返回 `None`
pub fn parse_command(line: &str) -> Option<InputCommand> {
    let line = line.trim();
    let mut parts = line.split_whitespace();
    let head = parts.next().unwrap_or("").to_ascii_lowercase();

    let event = match head.as_str() {
        "" | "s" | "start" | "r" | "retake" => SessionEvent::Start,
        "n" | "next" => SessionEvent::Next,
        "p" | "prev" => SessionEvent::Previous,
        "g" | "goto" => {
            let number: usize = parts.next()?.parse().ok()?;
            SessionEvent::GoTo(number.checked_sub(1)?)
        }
        "submit" | "done" => SessionEvent::Submit,
        "q" | "quit" | "exit" => return Some(InputCommand::Quit),
        other => {
            let number: usize = other.parse().ok()?;
            SessionEvent::SelectCurrent(number.checked_sub(1)?)
        }
    };
    Some(InputCommand::Event(event))
}

/// 启动标准输入读取任务
///
/// 输入 `q` 或标准输入结束时任务退出，发送端随之关闭
pub fn spawn_stdin_reader() -> mpsc::Receiver<SessionEvent> {
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(&line) {
                Some(InputCommand::Event(event)) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Some(InputCommand::Quit) => break,
                None => println!("无法识别的输入: {:?}\n{}", line.trim(), HELP),
            }
        }
        debug!("标准输入读取结束");
    });

    rx
}

/// 终端渲染
#[derive(Default)]
pub struct TerminalObserver;

impl SessionObserver for TerminalObserver {
    fn on_update(&mut self, session: &QuizSession, event: &SessionEvent) {
        if session.state() != SessionState::InProgress {
            return;
        }
        match event {
            SessionEvent::Tick => {
                if let Some(remaining) = session.remaining_seconds() {
                    if remaining <= 5 || remaining % 30 == 0 {
                        println!("⏰ 剩余 {} 秒", remaining);
                    }
                }
            }
            SessionEvent::Submit => {}
            _ => render_current(session),
        }
    }

    fn on_rejected(&mut self, _session: &QuizSession, error: &SessionError) {
        println!("⚠️ {}", error);
    }
}

/// 渲染当前题目
pub fn render_current(session: &QuizSession) {
    let view = session.view();
    let Some(question) = view.current_question else {
        return;
    };
    let selected = session.selected(&question.id);

    println!("\n{}", "─".repeat(40));
    println!(
        "第 {}/{} 题 [{}]  已答 {}/{}{}",
        view.current_index + 1,
        view.total,
        question.kind.label(),
        view.answered_count,
        view.total,
        view.remaining_seconds
            .map(|s| format!("  剩余 {} 秒", s))
            .unwrap_or_default()
    );
    println!("{}", question.text);
    for (i, answer) in question.answers.iter().enumerate() {
        let mark = if selected.is_some_and(|s| s.contains(&answer.id)) {
            "[x]"
        } else {
            "[ ]"
        };
        println!("  {} {}. {}", mark, i + 1, answer.text);
    }
    println!("{}", HELP);
}

/// 渲染得分
pub fn render_score(session: &QuizSession, score: &ScoreResult) {
    println!("\n{}", "=".repeat(40));
    println!("📊 得分: {}", score);
    for (i, question) in session.ordered_questions().iter().enumerate() {
        let mark = match score.is_correct(&question.id) {
            Some(true) => "✅",
            _ => "❌",
        };
        println!("  {} {}. {}", mark, i + 1, truncate_text(&question.text, 40));
    }
    println!("{}", "=".repeat(40));
}
