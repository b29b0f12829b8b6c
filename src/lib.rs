//! # Quiz Engine
//!
//! 一个带限时作答、自动评分和经验值成长体系的测验引擎
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有持久化资源，只暴露能力
//! - `ProgressionStore` - 成长状态读取、带版本号的条件写入、作答历史追加
//! - `JsonFileStore` / `InMemoryStore` - 两种实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `normalizer` - 把不同字段命名的题目数据整理成统一结构
//! - `sequencer` - 题目乱序
//! - `scorer` - 评分
//! - `ProgressionUpdater` - 经验值、等级、连续天数
//! - `FallbackWriter` - 存储不可用时的本地兜底记录
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次作答"的完整流程
//! - `QuizSession` - 作答状态机（未开始 → 作答中 → 已完成）
//! - `AttemptCtx` - 上下文封装（quiz_id + learner_id + 第几次作答）
//! - `QuizFlow` - 完成流程（评分 → 作答历史 → 经验值）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 应用入口，管理资源和重做循环
//! - `orchestrator/session_runner` - 把输入和倒计时接到状态机
//! - `orchestrator/terminal` - 终端输入解析与渲染
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, ProgressionError, SessionError, StoreError};
pub use infrastructure::{InMemoryStore, JsonFileStore, ProgressionStore};
pub use models::{Question, QuizDefinition, ScoreResult};
pub use orchestrator::{run_session, App, SessionReport};
pub use services::{AwardOutcome, FallbackWriter, ProgressionSettings, ProgressionUpdater};
pub use workflow::{AttemptCtx, QuizFlow, QuizSession, SessionEvent, Submission};
