//! 题目规范化服务 - 业务能力层
//!
//! 把不同来源、字段命名不一致的题目记录转换为统一的 `Question`。
//! 字段别名是固定的枚举表，不做运行时反射。
//!
//! 丢弃规则：
//! - 缺少 id、题干为空、没有可用选项的题目
//! - 没有正确答案，或声明为单选却有多个正确答案的题目
//! - 缺少 id 或文本的单个选项
//! - id 重复的题目（保留第一条），同一题内 id 重复的选项（保留第一个）

use phf::phf_map;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::models::question::{Answer, Question, QuestionKind};

const ID_ALIASES: &[&str] = &["id"];
const BODY_ALIASES: &[&str] = &["question_text", "text"];
const ANSWER_TEXT_ALIASES: &[&str] = &["answer_text", "text"];
const IS_CORRECT_ALIASES: &[&str] = &["is_correct", "isCorrect"];
const KIND_ALIASES: &[&str] = &["question_type", "kind"];
const DISPLAY_ORDER_ALIASES: &[&str] = &["display_order", "order_index"];
const ANSWER_LIST_ALIASES: &[&str] = &["answers", "options"];

static KIND_WORDS: phf::Map<&'static str, QuestionKind> = phf_map! {
    "single" => QuestionKind::SingleSelect,
    "single_select" => QuestionKind::SingleSelect,
    "singleselect" => QuestionKind::SingleSelect,
    "radio" => QuestionKind::SingleSelect,
    "multiple" => QuestionKind::MultiSelect,
    "multi" => QuestionKind::MultiSelect,
    "multi_select" => QuestionKind::MultiSelect,
    "multiselect" => QuestionKind::MultiSelect,
    "checkbox" => QuestionKind::MultiSelect,
};

/// 规范化结果
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub questions: Vec<Question>,
    /// 被丢弃的题目数量
    pub dropped: usize,
}

impl NormalizeOutcome {
    /// 有题目被丢弃但仍可作答
    pub fn is_degraded(&self) -> bool {
        self.dropped > 0
    }
}

/// 规范化一组原始题目记录（纯函数）
///
/// 输出按 display_order 排序（稳定排序，相同时保持输入顺序）
pub fn normalize(raw_questions: &[JsonValue]) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();
    let mut seen_ids = HashSet::new();

    for (index, raw) in raw_questions.iter().enumerate() {
        let normalized = normalize_question(raw, index).and_then(|question| {
            if seen_ids.insert(question.id.clone()) {
                Ok(question)
            } else {
                Err(format!("题目 id {} 重复", question.id))
            }
        });
        match normalized {
            Ok(question) => outcome.questions.push(question),
            Err(reason) => {
                warn!("丢弃第 {} 条题目记录: {}", index + 1, reason);
                outcome.dropped += 1;
            }
        }
    }

    outcome.questions.sort_by_key(|q| q.display_order);
    debug!(
        "规范化完成: 保留 {} 道, 丢弃 {} 道",
        outcome.questions.len(),
        outcome.dropped
    );
    outcome
}

fn normalize_question(raw: &JsonValue, index: usize) -> Result<Question, String> {
    let record = raw.as_object().ok_or("记录不是对象")?;

    let id = lookup(record, ID_ALIASES)
        .and_then(coerce_id)
        .ok_or("缺少 id")?;

    let text = lookup(record, BODY_ALIASES)
        .and_then(coerce_text)
        .ok_or_else(|| format!("题目 {} 题干为空", id))?;

    let raw_answers = lookup(record, ANSWER_LIST_ALIASES)
        .and_then(JsonValue::as_array)
        .ok_or_else(|| format!("题目 {} 缺少选项列表", id))?;

    let mut seen_answer_ids = HashSet::new();
    let mut answers: Vec<Answer> = raw_answers
        .iter()
        .enumerate()
        .filter_map(|(answer_index, raw_answer)| normalize_answer(raw_answer, &id, answer_index))
        .filter(|answer| {
            let first = seen_answer_ids.insert(answer.id.clone());
            if !first {
                debug!("题目 {} 的选项 id {} 重复，已丢弃", id, answer.id);
            }
            first
        })
        .collect();

    if answers.is_empty() {
        return Err(format!("题目 {} 没有可用选项", id));
    }
    answers.sort_by_key(|a| a.display_order);

    let correct_count = answers.iter().filter(|a| a.is_correct).count();
    if correct_count == 0 {
        return Err(format!("题目 {} 没有正确答案", id));
    }

    let kind = match lookup(record, KIND_ALIASES).and_then(parse_kind) {
        Some(QuestionKind::SingleSelect) if correct_count > 1 => {
            return Err(format!("单选题 {} 有 {} 个正确答案", id, correct_count));
        }
        Some(kind) => kind,
        None if correct_count > 1 => QuestionKind::MultiSelect,
        None => QuestionKind::SingleSelect,
    };

    let display_order = lookup(record, DISPLAY_ORDER_ALIASES)
        .and_then(JsonValue::as_i64)
        .unwrap_or(index as i64);

    Ok(Question {
        id,
        text,
        kind,
        display_order,
        answers,
    })
}

fn normalize_answer(raw: &JsonValue, question_id: &str, index: usize) -> Option<Answer> {
    let record = raw.as_object()?;
    let id = lookup(record, ID_ALIASES).and_then(coerce_id);
    let text = lookup(record, ANSWER_TEXT_ALIASES).and_then(coerce_text);

    let (Some(id), Some(text)) = (id, text) else {
        debug!("题目 {} 的第 {} 个选项缺少 id 或文本，已丢弃", question_id, index + 1);
        return None;
    };

    // 只有布尔 true 才算正确，"true"、1 之类一律视为 false
    let is_correct = matches!(
        lookup(record, IS_CORRECT_ALIASES),
        Some(JsonValue::Bool(true))
    );

    let display_order = lookup(record, DISPLAY_ORDER_ALIASES)
        .and_then(JsonValue::as_i64)
        .unwrap_or(index as i64);

    Some(Answer {
        id,
        question_id: question_id.to_string(),
        text,
        is_correct,
        display_order,
    })
}

/// 按别名顺序查找第一个非 null 字段
fn lookup<'a>(record: &'a Map<String, JsonValue>, aliases: &[&str]) -> Option<&'a JsonValue> {
    aliases
        .iter()
        .filter_map(|alias| record.get(*alias))
        .find(|value| !value.is_null())
}

fn coerce_id(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_text(value: &JsonValue) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_kind(value: &JsonValue) -> Option<QuestionKind> {
    let word = value.as_str()?.trim().to_ascii_lowercase().replace('-', "_");
    KIND_WORDS.get(word.as_str()).copied()
}
