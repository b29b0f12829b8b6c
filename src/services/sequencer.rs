//! 出题顺序服务 - 业务能力层
//!
//! Fisher–Yates 洗牌。每次开始和每次重做都重新洗牌，不支持固定种子复现。

use rand::Rng;

use crate::models::question::Question;

/// 使用线程随机源打乱题目顺序
pub fn shuffle(questions: Vec<Question>) -> Vec<Question> {
    shuffle_with(questions, &mut rand::thread_rng())
}

/// 使用指定随机源打乱顺序
pub fn shuffle_with<T, R: Rng + ?Sized>(mut items: Vec<T>, rng: &mut R) -> Vec<T> {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
    items
}
