pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{QuizError, Result};
pub use models::{ParsedQuiz, QuizQuestion, QuizResult, QuizResultRecord};
pub use services::{parse_quiz_text, score, QuizSession};
