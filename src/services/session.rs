//! 测验会话状态机
//! Idle -> Presenting -> Completed，每个会话只属于一个学生

use crate::error::{QuizError, Result};
use crate::models::{OptionLabel, ParsedQuiz, QuizResult, QuizResultRecord};
use crate::services::parser::parse_quiz_text;
use crate::services::scoring;
use log::{info, warn};
use std::collections::BTreeMap;
use std::future::Future;

/// 测验文本生成（语言模型）
pub trait QuizTextGenerator {
    fn generate_quiz_text(&self, subject: &str) -> impl Future<Output = Result<String>> + Send;
}

/// 测验结果存储，时间戳由存储端分配
pub trait ResultStore {
    fn save_quiz_result(&self, student_id: &str, result: &QuizResult) -> Result<QuizResultRecord>;

    /// 按时间倒序返回
    fn list_quiz_results(&self, student_id: &str) -> Result<Vec<QuizResultRecord>>;
}

/// 可选科目列表
pub trait SubjectCatalog {
    fn list_subjects(&self) -> Result<Vec<String>>;
}

/// 会话阶段
#[derive(Debug, Clone, Default)]
pub enum QuizPhase {
    #[default]
    Idle,
    Presenting {
        quiz: ParsedQuiz,
        answers: BTreeMap<usize, OptionLabel>,
    },
    Completed {
        result: QuizResult,
    },
}

/// 提交结果：判分总会返回，保存失败单独报告
#[derive(Debug)]
pub struct Submission {
    pub result: QuizResult,
    pub saved: Result<QuizResultRecord>,
}

/// 测验会话
#[derive(Debug)]
pub struct QuizSession {
    student_id: String,
    subject: Option<String>,
    phase: QuizPhase,
}

impl QuizSession {
    pub fn new(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            subject: None,
            phase: QuizPhase::Idle,
        }
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn phase(&self) -> &QuizPhase {
        &self.phase
    }

    pub fn quiz(&self) -> Option<&ParsedQuiz> {
        match &self.phase {
            QuizPhase::Presenting { quiz, .. } => Some(quiz),
            _ => None,
        }
    }

    pub fn answers(&self) -> Option<&BTreeMap<usize, OptionLabel>> {
        match &self.phase {
            QuizPhase::Presenting { answers, .. } => Some(answers),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&QuizResult> {
        match &self.phase {
            QuizPhase::Completed { result } => Some(result),
            _ => None,
        }
    }

    /// 生成新测验，丢弃当前测验和结果
    pub async fn generate<G: QuizTextGenerator>(
        &mut self,
        generator: &G,
        subject: &str,
    ) -> Result<&ParsedQuiz> {
        self.phase = QuizPhase::Idle;
        self.subject = None;

        let raw_text = generator.generate_quiz_text(subject).await?;
        let quiz = parse_quiz_text(&raw_text);
        if quiz.is_empty() {
            warn!("Quiz for '{}' parsed to zero questions", subject);
            return Err(QuizError::EmptyQuiz);
        }

        let unanswerable = quiz.unanswerable_questions();
        if !unanswerable.is_empty() {
            warn!(
                "Quiz for '{}' has {} question(s) without an answer: {:?}",
                subject,
                unanswerable.len(),
                unanswerable
            );
        }
        info!(
            "Student {} started a {}-question quiz on '{}'",
            self.student_id,
            quiz.len(),
            subject
        );

        self.subject = Some(subject.to_string());
        self.phase = QuizPhase::Presenting {
            quiz,
            answers: BTreeMap::new(),
        };
        self.quiz().ok_or(QuizError::NoActiveQuiz)
    }

    /// 记录作答；可覆盖之前的选择，不校验标签是否属于该题选项
    pub fn select_answer(&mut self, question_index: usize, label: OptionLabel) -> Result<()> {
        match &mut self.phase {
            QuizPhase::Presenting { answers, .. } => {
                answers.insert(question_index, label);
                Ok(())
            }
            _ => Err(QuizError::NoActiveQuiz),
        }
    }

    /// 提交作答并保存结果
    pub fn submit<S: ResultStore>(&mut self, store: &S) -> Result<Submission> {
        let QuizPhase::Presenting { quiz, answers } = &self.phase else {
            return Err(QuizError::NoActiveQuiz);
        };

        let total = quiz.len();
        let answered = (0..total).filter(|i| answers.contains_key(i)).count();
        if answered < total {
            return Err(QuizError::IncompleteSubmission { answered, total });
        }

        let subject = self.subject.clone().unwrap_or_default();
        let result = scoring::score(quiz, answers, &subject)?;
        info!(
            "Student {} scored {}/{} on '{}'",
            self.student_id, result.score, result.total, subject
        );
        self.phase = QuizPhase::Completed {
            result: result.clone(),
        };

        let saved = store
            .save_quiz_result(&self.student_id, &result)
            .map_err(|e| match e {
                QuizError::Persistence(_) => e,
                other => QuizError::Persistence(other.to_string()),
            });
        if let Err(e) = &saved {
            warn!("Result for student {} was not saved: {}", self.student_id, e);
        }

        Ok(Submission { result, saved })
    }

    /// 从历史记录还原只读结果
    pub fn load_from_history(&mut self, record: &QuizResultRecord) -> QuizResult {
        let result = record.to_result();
        self.subject = Some(result.subject.clone());
        self.phase = QuizPhase::Completed {
            result: result.clone(),
        };
        result
    }
}
