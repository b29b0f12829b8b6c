use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;

use crate::error::{AppResult, ConfigError, FileError};

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 测验 TOML 文件存放目录
    pub quiz_folder: String,
    /// 要开始的测验 id，为空时使用第一个测验
    pub quiz_id: Option<String>,
    /// 当前学员 id（由身份提供方给出）
    pub learner_id: String,
    /// 成长值存储文件
    pub store_path: String,
    /// 未同步经验值的本地记录文件，空字符串表示只保存在内存
    pub fallback_file: String,
    /// 单次存储调用的超时时间（毫秒）
    pub store_timeout_ms: u64,
    /// 版本冲突时的最大重试次数
    pub max_cas_retries: u32,
    /// 倒计时节拍间隔（毫秒），每个节拍计一秒
    pub tick_interval_ms: u64,
    /// 计算自然日使用的 UTC 偏移（分钟）
    pub day_offset_minutes: i32,
    /// 测验未配置经验值时的默认奖励
    pub default_xp_reward: u32,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quiz_folder: "quizzes".to_string(),
            quiz_id: None,
            learner_id: "local-learner".to_string(),
            store_path: "progression.json".to_string(),
            fallback_file: "unsynced_awards.jsonl".to_string(),
            store_timeout_ms: 3000,
            max_cas_retries: 3,
            tick_interval_ms: 1000,
            day_offset_minutes: 0,
            default_xp_reward: 50,
            verbose_logging: false,
            output_log_file: "quiz_log.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载配置，再用环境变量覆盖
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(FileError::NotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::AppError::file_read_failed(path.display().to_string(), e))?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    pub fn from_toml_str(content: &str, origin: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|source| {
            ConfigError::TomlParseFailed {
                path: origin.to_string(),
                source,
            }
            .into()
        })
    }

    fn with_env_overrides(self) -> Self {
        let default = self;
        Self {
            quiz_folder: std::env::var("QUIZ_FOLDER").unwrap_or(default.quiz_folder),
            quiz_id: std::env::var("QUIZ_ID").ok().or(default.quiz_id),
            learner_id: std::env::var("LEARNER_ID").unwrap_or(default.learner_id),
            store_path: std::env::var("STORE_PATH").unwrap_or(default.store_path),
            fallback_file: std::env::var("FALLBACK_FILE").unwrap_or(default.fallback_file),
            store_timeout_ms: env_parse("STORE_TIMEOUT_MS", default.store_timeout_ms),
            max_cas_retries: env_parse("MAX_CAS_RETRIES", default.max_cas_retries),
            tick_interval_ms: env_parse("TICK_INTERVAL_MS", default.tick_interval_ms),
            day_offset_minutes: env_parse("DAY_OFFSET_MINUTES", default.day_offset_minutes),
            default_xp_reward: env_parse("DEFAULT_XP_REWARD", default.default_xp_reward),
            verbose_logging: env_parse("VERBOSE_LOGGING", default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.learner_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "learner_id",
                reason: "不能为空".to_string(),
            }
            .into());
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store_timeout_ms",
                reason: "必须大于 0".to_string(),
            }
            .into());
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tick_interval_ms",
                reason: "必须大于 0".to_string(),
            }
            .into());
        }
        if self.day_offset().is_none() {
            return Err(ConfigError::InvalidValue {
                field: "day_offset_minutes",
                reason: format!("{} 超出 ±24 小时", self.day_offset_minutes),
            }
            .into());
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// 自然日边界所在的时区
    pub fn day_offset(&self) -> Option<FixedOffset> {
        self.day_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    pub fn fallback_path(&self) -> Option<&str> {
        if self.fallback_file.trim().is_empty() {
            None
        } else {
            Some(self.fallback_file.as_str())
        }
    }
}

/// 读取并解析环境变量，缺失或无法解析时使用 `fallback`
fn env_parse<T: FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}
