use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化 tracing 日志
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info。
/// 重复初始化时静默忽略（测试中会多次调用）
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n测验日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 测验模式");
    info!("👤 学员: {}", config.learner_id);
    info!("📁 测验目录: {}", config.quiz_folder);
    info!("💾 成长值存储: {}", config.store_path);
    info!("{}", "=".repeat(60));
}

/// 记录测验加载信息
///
/// # 参数
/// - `total`: 测验总数
pub fn log_quizzes_loaded(total: usize) {
    info!("✓ 找到 {} 个测验", total);
}

/// 打印最终统计信息
///
/// # 参数
/// - `completed`: 完成次数
/// - `abandoned`: 放弃次数
/// - `pending_sync`: 未同步的经验值记录数
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(completed: usize, abandoned: usize, pending_sync: usize, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 本次运行统计");
    info!(
        "结束时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 完成: {}", completed);
    info!("🚪 放弃: {}", abandoned);
    if pending_sync > 0 {
        info!("⏳ 待同步经验值记录: {}", pending_sync);
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("选择正确的答案", 4), "选择正确...");
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        init(true);
    }
}
