//! 交互式测验命令

use super::AppState;
use crate::error::QuizError;
use crate::services::session::{QuizSession, QuizTextGenerator, SubjectCatalog};
use anyhow::{anyhow, Result};
use log::{error, warn};
use std::io::{BufRead, Write};

/// 生成并进行一次测验，返回判分结果
///
/// 未指定科目时使用目录中的第一个科目。
pub async fn run_quiz<G, R, W>(
    state: &AppState,
    generator: &G,
    student_id: &str,
    subject: Option<String>,
    input: &mut R,
    out: &mut W,
) -> Result<super::QuizResultDto>
where
    G: QuizTextGenerator,
    R: BufRead,
    W: Write,
{
    let subjects = state.db.list_subjects()?;
    let subject = match subject {
        Some(s) => {
            if !subjects.is_empty() && !subjects.contains(&s) {
                warn!("Subject '{}' is not in the syllabus catalog", s);
            }
            s
        }
        None => subjects
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Please select a subject."))?,
    };

    writeln!(out, "Generating a quiz on {}...", subject)?;
    let mut session = QuizSession::new(student_id);
    if let Err(e) = session.generate(generator, &subject).await {
        error!("Error generating quiz: {}", e);
        writeln!(out, "Could not generate quiz.")?;
        return Err(e.into());
    }

    let quiz = session.quiz().cloned().ok_or(QuizError::NoActiveQuiz)?;
    writeln!(out, "Quiz on {}", subject)?;

    let mut line = String::new();
    for (index, question) in quiz.questions().iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "{}. {}", index + 1, question.question())?;
        for option in question.options() {
            writeln!(out, "   {}) {}", option.label, option.text)?;
        }

        let label = loop {
            write!(out, "Your answer: ")?;
            out.flush()?;
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break None;
            }
            match parse_choice(&line) {
                Some(label) => break Some(label),
                None => writeln!(out, "Please enter a single option letter.")?,
            }
        };

        match label {
            Some(label) => session.select_answer(index, label)?,
            None => break,
        }
    }

    let submission = match session.submit(&state.db) {
        Ok(submission) => submission,
        Err(e @ QuizError::IncompleteSubmission { .. }) => {
            writeln!(out, "Please answer all questions.")?;
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let result = &submission.result;
    writeln!(out)?;
    writeln!(out, "Quiz Results for {}", result.subject)?;
    writeln!(
        out,
        "You scored {} out of {}. Passing score is {}%.",
        result.score, result.total, state.config.pass_mark
    )?;

    match &submission.saved {
        Ok(record) => {
            writeln!(out, "Quiz Submitted! Your results have been saved.")?;
            Ok(super::QuizResultDto::from_record(record, state.config.pass_mark))
        }
        Err(e) => {
            error!("Error saving quiz result: {}", e);
            writeln!(out, "Could not save your results.")?;
            Ok(super::QuizResultDto {
                id: String::new(),
                subject: result.subject.clone(),
                score: result.score,
                total: result.total,
                percentage: result.percentage,
                correct_answers: result.correct_answers,
                incorrect_answers: result.incorrect_answers,
                timestamp: String::new(),
                passed: result.passed(state.config.pass_mark),
            })
        }
    }
}

/// 读取单个选项字母，不校验是否属于该题选项
fn parse_choice(line: &str) -> Option<char> {
    let mut chars = line.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) | (Some(c), Some(')')) if c.is_ascii_alphabetic() => {
            Some(c.to_ascii_uppercase())
        }
        _ => None,
    }
}
