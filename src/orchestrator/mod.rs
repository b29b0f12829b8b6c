//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责事件调度和资源管理，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、运行、统计）
//! - 持有存储和完成流程
//! - 支持重做
//!
//! ### `session_runner` - 会话驱动器
//! - 把学员输入和倒计时节拍接到同一个状态机
//! - 处理放弃作答
//!
//! ### `terminal` - 终端展示
//! - 输入解析、题目和得分渲染
//!
//! ## 层次关系
//!
//! ```text
//! app (持有 Store / QuizFlow)
//!     ↓
//! session_runner (输入 + 倒计时 → 事件)
//!     ↓
//! workflow::QuizFlow / QuizSession (状态机与完成流程)
//!     ↓
//! services (能力层：normalize / shuffle / score / progression)
//!     ↓
//! infrastructure (基础设施：ProgressionStore)
//! ```

pub mod app;
pub mod session_runner;
pub mod terminal;

// 重新导出主要类型
pub use app::App;
pub use session_runner::{run_session, SessionObserver, SessionReport, SilentObserver};
pub use terminal::{parse_command, InputCommand, TerminalObserver};
