//! 评分服务 - 业务能力层
//!
//! 单选、多选都要求作答集合与正确答案集合完全相等，没有部分得分。
//! 未作答的题目计为错误，仍然计入分母。

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::question::{AnswerId, Question, QuestionId, QuestionKind};
use crate::models::score::ScoreResult;

/// 作答记录：题目 id -> 选中的选项 id 集合
pub type Selections = HashMap<QuestionId, BTreeSet<AnswerId>>;

/// 计算得分（纯函数）
///
/// `questions` 是本次会话实际展示的题目，id 应当唯一（由 Normalizer 保证）。
/// 分子和分母都取自同一张按 id 的结果表
pub fn score(questions: &[Question], selections: &Selections) -> ScoreResult {
    let per_question_correctness: BTreeMap<QuestionId, bool> = questions
        .iter()
        .map(|q| (q.id.clone(), is_correct(q, selections.get(&q.id))))
        .collect();

    let correct = per_question_correctness.values().filter(|c| **c).count();

    ScoreResult {
        percentage: percentage(correct, per_question_correctness.len()),
        per_question_correctness,
    }
}

/// 判断单道题是否答对
pub fn is_correct(question: &Question, selected: Option<&BTreeSet<AnswerId>>) -> bool {
    let Some(selected) = selected else {
        return false;
    };

    let key: BTreeSet<&str> = question.correct_answer_ids().collect();
    if key.is_empty() {
        return false;
    }
    // 单选题答案必须恰好一个，不依赖作答时的折叠逻辑
    if question.kind == QuestionKind::SingleSelect && (key.len() != 1 || selected.len() != 1) {
        return false;
    }

    selected.len() == key.len() && selected.iter().all(|id| key.contains(id.as_str()))
}

/// 四舍五入（0.5 向上）的百分比
pub fn percentage(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = correct.min(total);
    ((correct * 100 + total / 2) / total) as u8
}
