use thiserror::Error;

use crate::workflow::session::SessionState;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 作答会话错误
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
    /// 成长值更新错误
    #[error("成长值错误: {0}")]
    Progression(#[from] ProgressionError),
    /// 持久化存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 作答会话错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// 规范化后没有可用题目，无法开始测验
    #[error("测验 {quiz_id} 没有可用题目 (丢弃 {dropped} 道)")]
    NoPlayableQuestions { quiz_id: String, dropped: usize },
    /// 当前状态不允许该操作
    #[error("当前状态 {state:?} 不允许操作: {action}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },
    /// 题目不在本次会话中
    #[error("题目不存在: {question_id}")]
    UnknownQuestion { question_id: String },
    /// 选项不属于该题目
    #[error("题目 {question_id} 没有选项 {answer_id}")]
    UnknownAnswer {
        question_id: String,
        answer_id: String,
    },
    /// 题目索引超出范围
    #[error("索引 {index} 超出范围 [0, {max_index}]")]
    IndexOutOfRange { index: usize, max_index: usize },
}

/// 成长值更新错误（调用方错误）
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressionError {
    /// 经验值必须为正数
    #[error("经验值必须大于 0，实际为 {0}")]
    InvalidXpAmount(i64),
}

/// 持久化存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 存储不可达
    #[error("存储不可用: {0}")]
    Unavailable(String),
    /// 调用超时
    #[error("存储调用超时 ({timeout_ms}ms)")]
    Timeout { timeout_ms: u64 },
    /// 乐观并发冲突：存储中的版本与预期不一致
    #[error("学员 {learner_id} 版本冲突: 预期 {expected:?}, 实际 {actual:?}")]
    VersionConflict {
        learner_id: String,
        expected: Option<u64>,
        actual: Option<u64>,
    },
    /// 序列化失败
    #[error("序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 读写存储文件失败
    #[error("存储文件读写失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// 是否为版本冲突（可以重新读取后重试）
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件解析失败
    #[error("配置文件 {path} 解析失败: {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }
}

impl StoreError {
    /// 创建存储文件读写错误
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 存储调用结果类型
pub type StoreResult<T> = Result<T, StoreError>;
