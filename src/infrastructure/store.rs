//! 持久化存储接口
//!
//! 存储对本模块只暴露三种调用，不约束具体表结构

use futures::future::BoxFuture;

use crate::error::StoreResult;
use crate::models::{AttemptSummary, ProgressionState};

/// 成长值持久化存储
///
/// 职责：
/// - 按学员读取成长状态
/// - 条件写入（比较版本号），防止并发写入丢失增量
/// - 记录作答历史
pub trait ProgressionStore: Send + Sync {
    /// 读取学员的成长状态，不存在时返回 `None`
    fn load_progression<'a>(
        &'a self,
        learner_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<ProgressionState>>>;

    /// 条件写入成长状态
    ///
    /// - `expected_version` 为 `None`：只有记录不存在时才写入
    /// - `expected_version` 为 `Some(v)`：只有存储中的版本等于 `v` 时才写入
    ///
    /// 写入成功后版本号加一，返回存储中的新状态；否则返回 `StoreError::VersionConflict`
    fn save_progression<'a>(
        &'a self,
        state: &'a ProgressionState,
        expected_version: Option<u64>,
    ) -> BoxFuture<'a, StoreResult<ProgressionState>>;

    /// 记录一次作答
    fn record_attempt<'a>(&'a self, summary: &'a AttemptSummary) -> BoxFuture<'a, StoreResult<()>>;
}
