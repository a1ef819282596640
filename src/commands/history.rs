//! 测验历史命令

use super::AppState;
use crate::models::{HistoryStats, QuizResultRecord};
use crate::services::scoring::history_stats;
use crate::services::session::{QuizSession, ResultStore};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// 测验结果传输对象
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResultDto {
    pub id: String,
    pub subject: String,
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub timestamp: String,
    pub passed: bool,
}

impl QuizResultDto {
    pub fn from_record(record: &QuizResultRecord, pass_mark: f64) -> Self {
        Self {
            id: record.id.clone(),
            subject: record.result.subject.clone(),
            score: record.result.score,
            total: record.result.total,
            percentage: record.result.percentage,
            correct_answers: record.result.correct_answers,
            incorrect_answers: record.result.incorrect_answers,
            timestamp: record.timestamp.to_rfc3339(),
            passed: record.result.passed(pass_mark),
        }
    }
}

/// 历史记录传输对象
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDto {
    pub student_id: String,
    pub stats: HistoryStats,
    pub results: Vec<QuizResultDto>,
}

/// 输出学生的测验历史
pub fn show_history<W: Write>(
    state: &AppState,
    student_id: &str,
    json: bool,
    out: &mut W,
) -> Result<HistoryDto> {
    let records = state.db.list_quiz_results(student_id)?;
    let pass_mark = state.config.pass_mark;

    let dto = HistoryDto {
        student_id: student_id.to_string(),
        stats: history_stats(&records, pass_mark),
        results: records
            .iter()
            .map(|r| QuizResultDto::from_record(r, pass_mark))
            .collect(),
    };

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&dto)?)?;
        return Ok(dto);
    }

    if dto.results.is_empty() {
        writeln!(out, "No quiz history yet.")?;
        return Ok(dto);
    }

    writeln!(
        out,
        "Quiz history for {}: {} passed, {} failed (pass mark {}%)",
        student_id, dto.stats.passed, dto.stats.failed, pass_mark
    )?;
    for item in &dto.results {
        writeln!(
            out,
            "  {}  {:<40} {:>3}%  {}  [{}]",
            record_time(&item.timestamp),
            item.subject,
            item.percentage.round(),
            if item.passed { "PASS" } else { "FAIL" },
            item.id
        )?;
    }

    Ok(dto)
}

/// 从历史中还原一次测验结果
pub fn show_result<W: Write>(
    state: &AppState,
    student_id: &str,
    record_id: &str,
    out: &mut W,
) -> Result<QuizResultDto> {
    let record = state
        .db
        .get_quiz_result(record_id)?
        .filter(|r| r.student_id == student_id)
        .ok_or_else(|| anyhow!("No quiz result {} for student {}", record_id, student_id))?;

    let mut session = QuizSession::new(student_id);
    let result = session.load_from_history(&record);

    writeln!(out, "Quiz Results for {}", result.subject)?;
    writeln!(
        out,
        "You scored {} out of {}. Passing score is {}%.",
        result.score, result.total, state.config.pass_mark
    )?;
    writeln!(
        out,
        "Correct: {}  Incorrect: {}",
        result.correct_answers, result.incorrect_answers
    )?;

    Ok(QuizResultDto::from_record(&record, state.config.pass_mark))
}

fn record_time(rfc3339: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| rfc3339.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::QuizResult;
    use crate::services::database::DatabaseService;

    fn state_with_history() -> AppState {
        let db = DatabaseService::open_in_memory().unwrap();
        for (subject, correct) in [("Networks", 12), ("Compilers", 6)] {
            db.save_quiz_result(
                "s1",
                &QuizResult {
                    subject: subject.to_string(),
                    score: correct,
                    total: 15,
                    percentage: correct as f64 / 15.0 * 100.0,
                    correct_answers: correct,
                    incorrect_answers: 15 - correct,
                },
            )
            .unwrap();
        }
        AppState::new(db, AppConfig::default())
    }

    #[test]
    fn test_show_history_text() {
        let state = state_with_history();
        let mut out = Vec::new();
        let dto = show_history(&state, "s1", false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(dto.results.len(), 2);
        assert_eq!(dto.results[0].subject, "Compilers");
        assert!(!dto.results[0].passed);
        assert!(dto.results[1].passed);
        assert_eq!(dto.stats.passed, 1);
        assert!(text.contains("1 passed, 1 failed"));
        assert!(text.contains("FAIL"));
    }

    #[test]
    fn test_show_history_json() {
        let state = state_with_history();
        let mut out = Vec::new();
        show_history(&state, "s1", true, &mut out).unwrap();

        let parsed: HistoryDto = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.student_id, "s1");
        assert_eq!(parsed.stats.attempts, 2);
    }

    #[test]
    fn test_empty_history() {
        let state = state_with_history();
        let mut out = Vec::new();
        show_history(&state, "s2", false, &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "No quiz history yet.\n");
    }

    #[test]
    fn test_show_result_from_history() {
        let state = state_with_history();
        let id = state.db.list_quiz_results("s1").unwrap()[1].id.clone();
        let mut out = Vec::new();
        let dto = show_result(&state, "s1", &id, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(dto.subject, "Networks");
        assert!(text.contains("You scored 12 out of 15"));
        assert!(show_result(&state, "s2", &id, &mut Vec::new()).is_err());
    }
}
