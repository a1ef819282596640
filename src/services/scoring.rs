//! 判分与历史统计

use crate::error::{QuizError, Result};
use crate::models::{HistoryStats, OptionLabel, ParsedQuiz, QuizResult, QuizResultRecord};
use std::collections::BTreeMap;

/// 默认及格线（百分比）
pub const DEFAULT_PASS_MARK: f64 = 75.0;

/// 对一次作答判分
///
/// 调用方需保证每道题都有作答；缺失的作答按答错处理。
/// 没有答案的题目永远不会被判为正确。
pub fn score(
    quiz: &ParsedQuiz,
    answers: &BTreeMap<usize, OptionLabel>,
    subject: &str,
) -> Result<QuizResult> {
    if quiz.is_empty() {
        return Err(QuizError::EmptyQuiz);
    }

    let correct = quiz
        .questions()
        .iter()
        .enumerate()
        .filter(|(index, question)| match (answers.get(index), question.answer()) {
            (Some(selected), Some(expected)) => *selected == expected,
            _ => false,
        })
        .count() as u32;
    let total = quiz.len() as u32;

    Ok(QuizResult {
        subject: subject.to_string(),
        score: correct,
        total,
        percentage: correct as f64 / total as f64 * 100.0,
        correct_answers: correct,
        incorrect_answers: total - correct,
    })
}

/// 统计历史记录的及格情况
pub fn history_stats(records: &[QuizResultRecord], pass_mark: f64) -> HistoryStats {
    let attempts = records.len() as u32;
    let passed = records
        .iter()
        .filter(|r| r.result.passed(pass_mark))
        .count() as u32;

    let average_percentage = if attempts > 0 {
        records.iter().map(|r| r.result.percentage).sum::<f64>() / attempts as f64
    } else {
        0.0
    };
    let best_percentage = records
        .iter()
        .map(|r| r.result.percentage)
        .fold(0.0, f64::max);

    HistoryStats {
        attempts,
        passed,
        failed: attempts - passed,
        average_percentage,
        best_percentage,
    }
}
