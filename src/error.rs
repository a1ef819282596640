//! 测验引擎错误类型

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuizError {
    #[error("Quiz generation failed: {0}")]
    Generation(String),

    #[error("Generated quiz contained no questions")]
    EmptyQuiz,

    #[error("Please answer all questions ({answered} of {total} answered)")]
    IncompleteSubmission { answered: usize, total: usize },

    #[error("No quiz is in progress")]
    NoActiveQuiz,

    #[error("Model response could not be parsed: {0}")]
    MalformedResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not save quiz result: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuizError {
    /// 生成失败与空测验都属于可重试的生成错误
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, QuizError::Generation(_) | QuizError::EmptyQuiz)
    }
}

pub type Result<T> = std::result::Result<T, QuizError>;
