//! 学习助手命令

use super::AppState;
use crate::services::assistant::{
    self, describe_course, ChatModel, CodeSolution, DailyPlan, ExamStrategy, TutorRequest,
    TutorTurn,
};
use crate::services::session::{ResultStore, SubjectCatalog};
use anyhow::{anyhow, Result};
use log::error;
use std::collections::BTreeSet;
use std::io::{BufRead, Write};

const NO_SYLLABUS: &str = "No syllabus has been imported.";

/// 辅导用的大纲文本，未指定科目时包含全部课程
pub fn syllabus_context(state: &AppState, subject: Option<&str>) -> Result<String> {
    let courses = match subject {
        Some(title) => {
            let course = state
                .db
                .find_course(title)?
                .ok_or_else(|| anyhow!("Unknown subject '{}'", title))?;
            vec![course]
        }
        None => state.db.get_courses()?,
    };

    if courses.is_empty() {
        return Ok(NO_SYLLABUS.to_string());
    }
    Ok(courses
        .iter()
        .map(describe_course)
        .collect::<Vec<_>>()
        .join("\n"))
}

/// 交互式辅导，直到输入 exit 或读到 EOF；返回完整对话
pub async fn run_tutor<M, R, W>(
    state: &AppState,
    model: &M,
    student_name: &str,
    subject: Option<&str>,
    input: &mut R,
    out: &mut W,
) -> Result<Vec<TutorTurn>>
where
    M: ChatModel,
    R: BufRead,
    W: Write,
{
    let syllabus = syllabus_context(state, subject)?;
    writeln!(out, "Ask a question about your studies. Type 'exit' to finish.")?;

    let mut history: Vec<TutorTurn> = Vec::new();
    let mut line = String::new();
    loop {
        write!(out, "You: ")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        let request = TutorRequest {
            student_name: student_name.to_string(),
            syllabus: syllabus.clone(),
            question: question.to_string(),
            history: history.clone(),
        };
        match assistant::ask_tutor(model, &request).await {
            Ok(answer) => {
                writeln!(out, "Tutor: {}", answer)?;
                history.push(TutorTurn::student(question));
                history.push(TutorTurn::assistant(answer));
            }
            Err(e) => {
                error!("Error from tutor: {}", e);
                writeln!(out, "Sorry, I couldn't answer that. Please try again.")?;
            }
        }
    }

    Ok(history)
}

/// 课程中的第 `number` 个实验题，从 1 开始
pub fn resolve_exercise(state: &AppState, subject: &str, number: usize) -> Result<String> {
    let course = state
        .db
        .find_course(subject)?
        .ok_or_else(|| anyhow!("Unknown subject '{}'", subject))?;

    number
        .checked_sub(1)
        .and_then(|i| course.exercises.get(i))
        .cloned()
        .ok_or_else(|| anyhow!("'{}' has no lab exercise {}", subject, number))
}

/// 生成并输出实验代码解答
pub async fn code_solution<M, W>(
    model: &M,
    exercise_description: &str,
    json: bool,
    out: &mut W,
) -> Result<CodeSolution>
where
    M: ChatModel,
    W: Write,
{
    let solution = match assistant::generate_code_solution(model, exercise_description).await {
        Ok(solution) => solution,
        Err(e) => {
            error!("Error generating code solution: {}", e);
            writeln!(out, "Could not generate a solution.")?;
            return Err(e.into());
        }
    };

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&solution)?)?;
    } else {
        writeln!(out, "Code Solution:")?;
        writeln!(out, "{}", solution.code_solution)?;
        writeln!(out)?;
        writeln!(out, "Explanation:")?;
        writeln!(out, "{}", solution.explanation)?;
    }

    Ok(solution)
}

/// 每个科目只看最近一次测验，未通过的按时间倒序返回
pub fn struggling_subjects(state: &AppState, student_id: &str) -> Result<Vec<String>> {
    let pass_mark = state.config.pass_mark;
    let mut seen = BTreeSet::new();
    let mut struggling = Vec::new();

    for record in state.db.list_quiz_results(student_id)? {
        if !seen.insert(record.result.subject.clone()) {
            continue;
        }
        if !record.result.passed(pass_mark) {
            struggling.push(record.result.subject);
        }
    }

    Ok(struggling)
}

/// 生成七天学习计划；未给科目时取学生尚未通过的科目
pub async fn study_plan<M, W>(
    state: &AppState,
    model: &M,
    subjects: Vec<String>,
    student_id: Option<&str>,
    json: bool,
    out: &mut W,
) -> Result<Vec<DailyPlan>>
where
    M: ChatModel,
    W: Write,
{
    let subjects = match student_id {
        Some(student_id) if subjects.is_empty() => {
            let struggling = struggling_subjects(state, student_id)?;
            if !struggling.is_empty() {
                writeln!(
                    out,
                    "Planning for subjects you have not passed yet: {}",
                    struggling.join(", ")
                )?;
            }
            struggling
        }
        _ => subjects,
    };
    if subjects.is_empty() {
        return Err(anyhow!("Please enter at least one subject."));
    }

    let plan = match assistant::generate_study_plan(model, &subjects).await {
        Ok(plan) => plan,
        Err(e) => {
            error!("Error generating study plan: {}", e);
            writeln!(out, "Could not generate a study plan.")?;
            return Err(e.into());
        }
    };

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&plan)?)?;
    } else {
        for day in &plan {
            writeln!(out, "{}: {}", day.day, day.plan)?;
        }
    }

    Ok(plan)
}

/// 生成考试策略；未指定科目时使用目录中的第一个科目
pub async fn exam_strategy<M, W>(
    state: &AppState,
    model: &M,
    subject: Option<String>,
    json: bool,
    out: &mut W,
) -> Result<ExamStrategy>
where
    M: ChatModel,
    W: Write,
{
    let subject = match subject {
        Some(subject) => subject,
        None => state
            .db
            .list_subjects()?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Please select a subject."))?,
    };

    let strategy = match assistant::generate_exam_strategy(model, &subject).await {
        Ok(strategy) => strategy,
        Err(e) => {
            error!("Error generating exam strategy: {}", e);
            writeln!(out, "Could not generate exam strategy.")?;
            return Err(e.into());
        }
    };

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&strategy)?)?;
    } else {
        writeln!(out, "Exam strategy for {}", subject)?;
        writeln!(out)?;
        writeln!(out, "Likely Questions:\n{}", strategy.likely_questions)?;
        writeln!(out)?;
        writeln!(out, "Revision Notes:\n{}", strategy.revision_notes)?;
        writeln!(out)?;
        writeln!(out, "Model Answer:\n{}", strategy.model_answer)?;
    }

    Ok(strategy)
}
