//! 测验文本解析引擎
//! 逐行扫描模型输出，提取编号题目、A-C 选项和 "Answer Key:" 答案块

use crate::models::{OptionLabel, ParsedQuiz, QuizQuestion};
use log::{debug, warn};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

// 只接受 ASCII 数字
static QUESTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)\.\s(.+)").expect("question pattern"));

// 生成提示词固定要求三个选项，D 及以后不视为选项行
static OPTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-C])\)\s(.+)").expect("option pattern"));

static ANSWER_KEY_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Answer Key:").expect("answer key header pattern"));

// 答案块接受 A-D，比选项范围宽
static ANSWER_KEY_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)\.\s*([A-D])").expect("answer key entry pattern"));

/// 测验文本解析器
#[derive(Debug, Default)]
pub struct QuizTextParser {
    reading_answers: bool,
    current_question: Option<QuizQuestion>,
    questions: Vec<QuizQuestion>,
    answer_key: BTreeMap<u32, OptionLabel>,
    skipped_lines: usize,
}

impl QuizTextParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析原始文本；不会失败，格式错误时返回能识别的部分
    pub fn parse(&mut self, raw_text: &str) -> ParsedQuiz {
        self.reset();

        for line in raw_text.lines().filter(|l| !l.trim().is_empty()) {
            self.process_line(line);
        }

        self.save_current_question();
        self.build_parsed_quiz()
    }

    fn reset(&mut self) {
        self.reading_answers = false;
        self.current_question = None;
        self.questions.clear();
        self.answer_key.clear();
        self.skipped_lines = 0;
    }

    fn process_line(&mut self, line: &str) {
        if ANSWER_KEY_HEADER.is_match(line) {
            if self.questions.is_empty() && self.current_question.is_none() {
                debug!("Answer key header appeared before any question");
            }
            self.reading_answers = true;
            return;
        }

        if self.reading_answers {
            for (number, label) in parse_answer_key_line(line) {
                self.answer_key.insert(number, label);
            }
            return;
        }

        if let Some(cap) = QUESTION_PATTERN.captures(line) {
            self.start_new_question(cap[2].trim());
        } else if let Some(cap) = OPTION_PATTERN.captures(line) {
            let label = cap[1].chars().next();
            match (self.current_question.as_mut(), label) {
                (Some(question), Some(label)) => question.set_option(label, cap[2].trim()),
                _ => self.skipped_lines += 1,
            }
        } else {
            self.skipped_lines += 1;
        }
    }

    fn start_new_question(&mut self, stem: &str) {
        self.save_current_question();
        self.current_question = Some(QuizQuestion::new(stem));
    }

    fn save_current_question(&mut self) {
        if let Some(question) = self.current_question.take() {
            self.questions.push(question);
        }
    }

    fn build_parsed_quiz(&mut self) -> ParsedQuiz {
        let quiz = ParsedQuiz::new(
            std::mem::take(&mut self.questions),
            std::mem::take(&mut self.answer_key),
        );

        debug!(
            "Parsed {} questions, {} answer key entries, {} lines skipped",
            quiz.len(),
            quiz.answer_key().len(),
            self.skipped_lines
        );
        if !self.reading_answers {
            warn!("No 'Answer Key:' header found; quiz cannot be graded");
        }

        quiz
    }
}

/// 从答案块的一行中提取所有 `<题号>. <字母>`
pub fn parse_answer_key_line(line: &str) -> Vec<(u32, OptionLabel)> {
    ANSWER_KEY_ENTRY
        .captures_iter(line)
        .filter_map(|cap| {
            let number = cap[1].parse::<u32>().ok()?;
            let label = cap[2].chars().next()?;
            Some((number, label))
        })
        .collect()
}

/// 从题目行中提取题目编号
pub fn extract_question_number(line: &str) -> Option<u32> {
    QUESTION_PATTERN
        .captures(line)
        .and_then(|cap| cap[1].parse().ok())
}

/// 简单解析测验文本
pub fn parse_quiz_text(raw_text: &str) -> ParsedQuiz {
    let mut parser = QuizTextParser::new();
    parser.parse(raw_text)
}
