//! 学习助手服务
//! 辅导问答、实验代码解答、七天学习计划和考试策略的提示词与输出解析

use crate::error::{QuizError, Result};
use crate::models::SyllabusCourse;
use crate::services::llm::ChatMessage;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::LazyLock;

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n]*\n(.*?)```").expect("code block pattern"));

static EXPLANATION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\**Explanation\**:\**").expect("explanation header pattern"));

static STRATEGY_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[#* \t]*(likely questions|revision notes|model answer)[* \t]*:\**")
        .expect("strategy header pattern")
});

/// 聊天补全模型
pub trait ChatModel {
    fn chat(&self, messages: &[ChatMessage]) -> impl Future<Output = anyhow::Result<String>> + Send;
}

// ==================== 数据结构 ====================

/// 辅导对话中的发言方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TutorRole {
    Student,
    Assistant,
}

/// 辅导对话中的一轮发言
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorTurn {
    pub role: TutorRole,
    pub text: String,
}

impl TutorTurn {
    pub fn student(text: impl Into<String>) -> Self {
        Self {
            role: TutorRole::Student,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TutorRole::Assistant,
            text: text.into(),
        }
    }
}

/// 辅导请求
#[derive(Debug, Clone, Default)]
pub struct TutorRequest {
    pub student_name: String,
    pub syllabus: String,
    pub question: String,
    pub history: Vec<TutorTurn>,
}

/// 实验代码解答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSolution {
    pub code_solution: String,
    pub explanation: String,
}

/// 学习计划中的一天
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPlan {
    pub day: String,
    pub plan: String,
}

/// 考试策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamStrategy {
    pub likely_questions: String,
    pub revision_notes: String,
    pub model_answer: String,
}

// ==================== 提示词 ====================

/// 学习助手提示词
pub struct AssistantPrompt;

impl AssistantPrompt {
    pub const CODE_SOLUTION_SYSTEM: &'static str =
        "You are an expert programming tutor specializing in providing code solutions and explanations for lab exercises.";

    pub const STUDY_PLAN_SYSTEM: &'static str =
        "You are a study coach for university students. Reply with JSON only.";

    pub const EXAM_STRATEGY_SYSTEM: &'static str =
        "You are an expert exam strategy assistant for university students.";

    pub fn tutor_system(student_name: &str, syllabus: &str) -> String {
        format!(
            r#"You are an AI Classroom Assistant for a student named {name}. Your personality is friendly, encouraging, and professional, like a helpful teaching assistant.

Your primary goal is to help the student learn and succeed.

General Guidelines:
- Keep a warm, conversational tone while maintaining a respectful and professional boundary.
- Prioritize the syllabus content below. Explain concepts clearly and simply.
- If the question is outside the syllabus but still academic (general science, math, study skills), give a helpful, concise answer.
- If the question is off-topic, personal, or inappropriate, politely decline and guide the conversation back to learning.
- Guide students to find answers themselves rather than giving the solution directly, especially for exams or assignments.
- Be encouraging and patient, especially if the student is struggling.

Syllabus Content:
{syllabus}"#,
            name = student_name,
            syllabus = syllabus
        )
    }

    /// 系统提示词 + 历史对话 + 当前问题
    pub fn tutor_messages(request: &TutorRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage::system(Self::tutor_system(
            &request.student_name,
            &request.syllabus,
        )));

        for turn in &request.history {
            messages.push(match turn.role {
                TutorRole::Student => ChatMessage::user(turn.text.as_str()),
                TutorRole::Assistant => ChatMessage::assistant(turn.text.as_str()),
            });
        }

        messages.push(ChatMessage::user(request.question.as_str()));
        messages
    }

    pub fn code_solution(exercise_description: &str) -> String {
        format!(
            r#"You will receive a description of a lab exercise. Provide both the code solution and a clear explanation of the code.

Exercise Description: {exercise}

Ensure the code is well-formatted and easy to understand. The explanation should guide the student through the logic and key concepts used in the code.

Your response MUST be in the following format:

**Code Solution:**
```
[Your Code Solution Here]
```

**Explanation:**
[Your Explanation Here]"#,
            exercise = exercise_description
        )
    }

    pub fn study_plan(subjects: &[String]) -> String {
        format!(
            r#"Create a personalized 7-day study plan for a student who finds the following subjects difficult: {subjects}.

Respond with a JSON array of daily plans, one for each day from Monday to Sunday. Each element must have two string fields: "day" and "plan".
The plan should be realistic, balancing theory and practical revision. Include specific topics to cover for each subject on each day.
Example element: {{"day": "Monday", "plan": "Morning: Review [Subject A] notes on [Topic 1]. Afternoon: Practice problems for [Subject B] on [Topic 2]."}}
Generate a complete plan for all 7 days of the week."#,
            subjects = subjects.join(", ")
        )
    }

    pub fn exam_strategy(subject: &str) -> String {
        format!(
            r#"Generate exam strategy tips for the subject: {subject}.

Use exactly these three section headers, each on its own line:
Likely Questions:
A list of 5 likely exam questions for the subject.

Revision Notes:
Short, point-wise revision notes for the main concepts in the subject.

Model Answer:
A very detailed model long answer, structured for university exams, for a question on the subject.

Output in plain text."#,
            subject = subject
        )
    }
}

/// 把课程信息整理成辅导用的大纲文本
pub fn describe_course(course: &SyllabusCourse) -> String {
    let mut text = match &course.category {
        Some(category) => format!("Course: {} ({})\n", course.title, category),
        None => format!("Course: {}\n", course.title),
    };

    let sections = [
        ("Units", &course.units),
        ("Lab exercises", &course.exercises),
        ("Electives", &course.options),
    ];
    for (heading, items) in sections {
        if items.is_empty() {
            continue;
        }
        text.push_str(heading);
        text.push_str(":\n");
        for item in items {
            text.push_str("- ");
            text.push_str(item);
            text.push('\n');
        }
    }

    text
}

// ==================== 输出解析 ====================

/// 提取第一个代码块和其后的讲解
pub fn parse_code_solution(text: &str) -> Result<CodeSolution> {
    let cap = CODE_BLOCK
        .captures(text)
        .ok_or_else(|| QuizError::MalformedResponse("no code block in solution".to_string()))?;
    let code_solution = cap[1].trim_end().to_string();
    let code_end = cap.get(0).map_or(text.len(), |m| m.end());

    let rest = &text[code_end..];
    let explanation = match EXPLANATION_HEADER.find(rest) {
        Some(m) => rest[m.end()..].trim(),
        None => rest.trim(),
    };
    if explanation.is_empty() {
        return Err(QuizError::MalformedResponse(
            "solution has no explanation".to_string(),
        ));
    }

    Ok(CodeSolution {
        code_solution,
        explanation: explanation.to_string(),
    })
}

/// 从输出中截取 JSON 数组并解析为每日计划
pub fn parse_study_plan(text: &str) -> Result<Vec<DailyPlan>> {
    let span = text
        .find('[')
        .zip(text.rfind(']'))
        .filter(|(start, end)| start < end);
    let Some((start, end)) = span else {
        return Err(QuizError::MalformedResponse(
            "no JSON array in study plan".to_string(),
        ));
    };

    let plan: Vec<DailyPlan> = serde_json::from_str(&text[start..=end])
        .map_err(|e| QuizError::MalformedResponse(format!("invalid study plan JSON: {}", e)))?;

    if plan.is_empty() {
        return Err(QuizError::MalformedResponse("study plan is empty".to_string()));
    }
    if plan.len() != 7 {
        warn!("Study plan covers {} days instead of 7", plan.len());
    }

    Ok(plan)
}

/// 按三个小节标题切分考试策略
pub fn parse_exam_strategy(text: &str) -> Result<ExamStrategy> {
    let headers: Vec<_> = STRATEGY_HEADER.captures_iter(text).collect();

    let mut likely_questions = None;
    let mut revision_notes = None;
    let mut model_answer = None;

    for (i, cap) in headers.iter().enumerate() {
        let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let body_end = headers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        let body = text[whole.end()..body_end].trim().to_string();

        let slot = match name.as_str().to_ascii_lowercase().as_str() {
            "likely questions" => &mut likely_questions,
            "revision notes" => &mut revision_notes,
            _ => &mut model_answer,
        };
        if slot.is_none() {
            *slot = Some(body);
        }
    }

    match (likely_questions, revision_notes, model_answer) {
        (Some(likely_questions), Some(revision_notes), Some(model_answer)) => Ok(ExamStrategy {
            likely_questions,
            revision_notes,
            model_answer,
        }),
        _ => Err(QuizError::MalformedResponse(
            "exam strategy is missing a section".to_string(),
        )),
    }
}

// ==================== 服务入口 ====================

async fn complete<M: ChatModel>(model: &M, messages: &[ChatMessage]) -> Result<String> {
    let text = model
        .chat(messages)
        .await
        .map_err(|e| QuizError::Generation(format!("{:#}", e)))?;

    if text.trim().is_empty() {
        return Err(QuizError::Generation("model returned no text".to_string()));
    }
    debug!("Assistant model returned {} chars", text.len());
    Ok(text)
}

/// 回答学生问题
pub async fn ask_tutor<M: ChatModel>(model: &M, request: &TutorRequest) -> Result<String> {
    if request.question.trim().is_empty() {
        return Err(QuizError::InvalidInput("question is empty".to_string()));
    }

    info!(
        "Tutor question from {} ({} previous turns)",
        request.student_name,
        request.history.len()
    );
    let answer = complete(model, &AssistantPrompt::tutor_messages(request)).await?;
    Ok(answer.trim().to_string())
}

/// 生成实验代码解答
pub async fn generate_code_solution<M: ChatModel>(
    model: &M,
    exercise_description: &str,
) -> Result<CodeSolution> {
    if exercise_description.trim().is_empty() {
        return Err(QuizError::InvalidInput("exercise description is empty".to_string()));
    }

    info!("Requesting code solution");
    let messages = [
        ChatMessage::system(AssistantPrompt::CODE_SOLUTION_SYSTEM),
        ChatMessage::user(AssistantPrompt::code_solution(exercise_description)),
    ];
    let text = complete(model, &messages).await?;
    parse_code_solution(&text)
}

/// 为困难科目生成七天学习计划
pub async fn generate_study_plan<M: ChatModel>(
    model: &M,
    subjects: &[String],
) -> Result<Vec<DailyPlan>> {
    let subjects: Vec<String> = subjects
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if subjects.is_empty() {
        return Err(QuizError::InvalidInput("no subjects given".to_string()));
    }

    info!("Requesting study plan for {:?}", subjects);
    let messages = [
        ChatMessage::system(AssistantPrompt::STUDY_PLAN_SYSTEM),
        ChatMessage::user(AssistantPrompt::study_plan(&subjects)),
    ];
    let text = complete(model, &messages).await?;
    parse_study_plan(&text)
}

/// 生成考试策略
pub async fn generate_exam_strategy<M: ChatModel>(model: &M, subject: &str) -> Result<ExamStrategy> {
    if subject.trim().is_empty() {
        return Err(QuizError::InvalidInput("subject is empty".to_string()));
    }

    info!("Requesting exam strategy for '{}'", subject);
    let messages = [
        ChatMessage::system(AssistantPrompt::EXAM_STRATEGY_SYSTEM),
        ChatMessage::user(AssistantPrompt::exam_strategy(subject)),
    ];
    let text = complete(model, &messages).await?;
    parse_exam_strategy(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::Role;
    use std::sync::Mutex;

    /// 返回固定文本并记录收到的消息
    struct CannedModel {
        reply: &'static str,
        seen: Mutex<Vec<ChatMessage>>,
    }

    impl CannedModel {
        fn new(reply: &'static str) -> Self {
            Self {
                reply,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChatModel for CannedModel {
        async fn chat(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            Ok(self.reply.to_string())
        }
    }

    struct DownModel;

    impl ChatModel for DownModel {
        async fn chat(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
            anyhow::bail!("connection refused")
        }
    }

    const SOLUTION: &str = "**Code Solution:**
```c
#include <stdio.h>
int main(void) { printf(\"hi\\n\"); return 0; }
```

**Explanation:**
The program prints a greeting with printf.";

    const STRATEGY: &str = "**Likely Questions:**
1. Explain paging.
2. Compare FCFS and SJF.

## Revision Notes:
- Paging splits memory into frames.

Model Answer:
Paging is a memory management scheme...";

    #[test]
    fn test_tutor_messages_carry_history_in_order() {
        let request = TutorRequest {
            student_name: "Asha".to_string(),
            syllabus: "Course: Operating Systems".to_string(),
            question: "What is a page fault?".to_string(),
            history: vec![
                TutorTurn::student("What is paging?"),
                TutorTurn::assistant("Paging divides memory into pages."),
            ],
        };
        let messages = AssistantPrompt::tutor_messages(&request);

        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert!(messages[0].content.contains("student named Asha"));
        assert!(messages[0].content.contains("Course: Operating Systems"));
        assert_eq!(messages[3].content, "What is a page fault?");
    }

    #[test]
    fn test_describe_course() {
        let course = SyllabusCourse {
            title: "Programming in C".to_string(),
            category: Some("core".to_string()),
            units: vec!["Pointers".to_string()],
            exercises: vec!["Reverse a string".to_string()],
            options: vec![],
        };

        assert_eq!(
            describe_course(&course),
            "Course: Programming in C (core)\nUnits:\n- Pointers\nLab exercises:\n- Reverse a string\n"
        );
    }

    #[test]
    fn test_parse_code_solution() {
        let solution = parse_code_solution(SOLUTION).unwrap();

        assert!(solution.code_solution.starts_with("#include <stdio.h>"));
        assert!(!solution.code_solution.contains("```"));
        assert_eq!(solution.explanation, "The program prints a greeting with printf.");
    }

    #[test]
    fn test_parse_code_solution_without_fence_fails() {
        let err = parse_code_solution("Just write a loop.").unwrap_err();
        assert!(matches!(err, QuizError::MalformedResponse(_)));

        let err = parse_code_solution("```\nint x;\n```").unwrap_err();
        assert!(matches!(err, QuizError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_study_plan_from_wrapped_json() {
        let text = "Here is your plan:\n```json\n{\"dailyPlan\": [\
            {\"day\": \"Monday\", \"plan\": \"Review pointers\"},\
            {\"day\": \"Tuesday\", \"plan\": \"Practice recursion\"}]}\n```";
        let plan = parse_study_plan(text).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].day, "Monday");
        assert_eq!(plan[1].plan, "Practice recursion");
    }

    #[test]
    fn test_parse_study_plan_rejects_bad_output() {
        assert!(matches!(
            parse_study_plan("Monday: rest"),
            Err(QuizError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_study_plan("[{\"day\": \"Monday\"}]"),
            Err(QuizError::MalformedResponse(_))
        ));
        assert!(matches!(parse_study_plan("[]"), Err(QuizError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_exam_strategy() {
        let strategy = parse_exam_strategy(STRATEGY).unwrap();

        assert!(strategy.likely_questions.starts_with("1. Explain paging."));
        assert!(strategy.likely_questions.ends_with("Compare FCFS and SJF."));
        assert_eq!(strategy.revision_notes, "- Paging splits memory into frames.");
        assert_eq!(strategy.model_answer, "Paging is a memory management scheme...");
    }

    #[test]
    fn test_parse_exam_strategy_missing_section() {
        let text = "Likely Questions:\n1. Why?\nRevision Notes:\n- because";
        assert!(matches!(
            parse_exam_strategy(text),
            Err(QuizError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_study_plan_sends_subjects() {
        let model = CannedModel::new(r#"[{"day": "Monday", "plan": "Graphs"}]"#);
        let subjects = vec!["Data Structures".to_string(), " ".to_string(), "Compilers".to_string()];
        let plan = generate_study_plan(&model, &subjects).await.unwrap();

        assert_eq!(plan, vec![DailyPlan { day: "Monday".to_string(), plan: "Graphs".to_string() }]);
        let seen = model.seen.lock().unwrap();
        assert!(seen[1].content.contains("difficult: Data Structures, Compilers."));
    }

    #[tokio::test]
    async fn test_generate_code_solution_and_strategy() {
        let solution = generate_code_solution(&CannedModel::new(SOLUTION), "Print hi in C")
            .await
            .unwrap();
        assert!(solution.code_solution.contains("printf"));

        let model = CannedModel::new(STRATEGY);
        let strategy = generate_exam_strategy(&model, "Operating Systems").await.unwrap();
        assert!(strategy.model_answer.starts_with("Paging"));
        assert!(model.seen.lock().unwrap()[1].content.contains("subject: Operating Systems."));
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_before_calling_model() {
        let model = CannedModel::new("unused");

        assert!(matches!(
            generate_study_plan(&model, &[]).await,
            Err(QuizError::InvalidInput(_))
        ));
        assert!(matches!(
            ask_tutor(&model, &TutorRequest::default()).await,
            Err(QuizError::InvalidInput(_))
        ));
        assert!(model.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_is_generation_error() {
        let request = TutorRequest {
            question: "Why?".to_string(),
            ..Default::default()
        };
        let err = ask_tutor(&DownModel, &request).await.unwrap_err();

        assert!(err.is_generation_failure());
        assert!(err.to_string().contains("connection refused"));
    }
}
