use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 测验定义（从 TOML 加载）
///
/// `questions` 保持松散类型，交给 Normalizer 处理不同来源的字段命名
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDefinition {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    /// 时间限制（秒），为空表示不限时
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<u64>,
    /// 是否为已审核测验，只有已审核测验发放经验值
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp_reward: Option<u32>,
    #[serde(default)]
    pub questions: Vec<JsonValue>,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<String>,
}

impl QuizDefinition {
    /// 获取经验值奖励，未配置时使用默认值
    pub fn xp_reward_or(&self, default: u32) -> u32 {
        self.xp_reward.unwrap_or(default)
    }

    pub fn with_file_path(mut self, file_path: String) -> Self {
        self.file_path = Some(file_path);
        self
    }
}

// 测验 id 可以写成字符串或整数
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer quiz id")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quiz_with_integer_id() {
        let quiz: QuizDefinition = toml::from_str(
            r#"
            id = 42
            title = "分数运算"
            is_verified = true

            [[questions]]
            id = 1
            question_text = "1/2 + 1/2 = ?"
            answers = [
                { id = "a", answer_text = "1", is_correct = true },
                { id = "b", answer_text = "2", is_correct = false },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(quiz.id, "42");
        assert!(quiz.is_verified);
        assert_eq!(quiz.time_limit_secs, None);
        assert_eq!(quiz.xp_reward_or(50), 50);
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0]["answers"][0]["is_correct"], true);
    }
}
