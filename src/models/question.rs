use serde::{Deserialize, Serialize};

pub type QuestionId = String;
pub type AnswerId = String;

/// 题目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionKind {
    /// 单选题
    SingleSelect,
    /// 多选题
    MultiSelect,
}

impl QuestionKind {
    /// 获取显示名称
    pub fn label(self) -> &'static str {
        match self {
            QuestionKind::SingleSelect => "单选",
            QuestionKind::MultiSelect => "多选",
        }
    }
}

/// 选项，只属于一道题目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub question_id: QuestionId,
    pub text: String,
    pub is_correct: bool,
    pub display_order: i64,
}

/// 规范化后的题目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub kind: QuestionKind,
    pub display_order: i64,
    pub answers: Vec<Answer>,
}

impl Question {
    /// 正确答案的 id 集合
    pub fn correct_answer_ids(&self) -> impl Iterator<Item = &str> {
        self.answers
            .iter()
            .filter(|a| a.is_correct)
            .map(|a| a.id.as_str())
    }

    /// 是否包含指定选项
    pub fn has_answer(&self, answer_id: &str) -> bool {
        self.answers.iter().any(|a| a.id == answer_id)
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 截断题干以便日志显示（最多60个字符）
        let preview = if self.text.chars().count() > 60 {
            self.text.chars().take(60).collect::<String>() + "..."
        } else {
            self.text.clone()
        };
        write!(f, "[{}] {}", self.kind.label(), preview)
    }
}
