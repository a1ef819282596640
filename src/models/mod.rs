//! 测验领域模型
//! 题目、解析结果、判分结果与持久化记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 选项标签（单个大写字母）
pub type OptionLabel = char;

/// 单个选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    pub label: OptionLabel,
    pub text: String,
}

/// 题目结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    question: String,
    options: Vec<QuizOption>,
    answer: Option<OptionLabel>,
}

impl QuizQuestion {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            options: Vec::new(),
            answer: None,
        }
    }

    /// 记录选项；重复标签覆盖原文本但保留首次出现的位置
    pub fn set_option(&mut self, label: OptionLabel, text: impl Into<String>) {
        let text = text.into();
        match self.options.iter_mut().find(|o| o.label == label) {
            Some(existing) => existing.text = text,
            None => self.options.push(QuizOption { label, text }),
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[QuizOption] {
        &self.options
    }

    pub fn option(&self, label: OptionLabel) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.label == label)
            .map(|o| o.text.as_str())
    }

    pub fn answer(&self) -> Option<OptionLabel> {
        self.answer
    }
}

/// 解析后的测验
///
/// 只能通过 [`ParsedQuiz::new`] 构造，保证 `questions[i].answer == answer_key[i + 1]`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedQuiz {
    questions: Vec<QuizQuestion>,
    answer_key: BTreeMap<u32, OptionLabel>,
}

impl ParsedQuiz {
    pub fn new(mut questions: Vec<QuizQuestion>, answer_key: BTreeMap<u32, OptionLabel>) -> Self {
        for (index, question) in questions.iter_mut().enumerate() {
            question.answer = u32::try_from(index + 1)
                .ok()
                .and_then(|number| answer_key.get(&number).copied());
        }

        Self {
            questions,
            answer_key,
        }
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn answer_key(&self) -> &BTreeMap<u32, OptionLabel> {
        &self.answer_key
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// 答案缺失、永远无法判对的题目下标
    pub fn unanswerable_questions(&self) -> Vec<usize> {
        self.questions
            .iter()
            .enumerate()
            .filter(|(_, q)| q.answer.is_none())
            .map(|(i, _)| i)
            .collect()
    }
}

/// 判分结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub subject: String,
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
}

impl QuizResult {
    pub fn passed(&self, pass_mark: f64) -> bool {
        self.percentage >= pass_mark
    }
}

/// 持久化的测验记录（只追加，不修改）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResultRecord {
    pub id: String,
    pub student_id: String,
    #[serde(flatten)]
    pub result: QuizResult,
    pub timestamp: DateTime<Utc>,
}

impl QuizResultRecord {
    /// 从历史记录还原只读结果，不依赖原始题目
    pub fn to_result(&self) -> QuizResult {
        self.result.clone()
    }
}

/// 历史统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub attempts: u32,
    pub passed: u32,
    pub failed: u32,
    pub average_percentage: f64,
    pub best_percentage: f64,
}

/// 教学大纲中的课程
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyllabusCourse {
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub units: Vec<String>,
    #[serde(default)]
    pub exercises: Vec<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

/// 学期 -> 课程代码 -> 课程
pub type Syllabus = BTreeMap<String, BTreeMap<String, SyllabusCourse>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_option_keeps_first_position() {
        let mut q = QuizQuestion::new("Pick one");
        q.set_option('A', "first");
        q.set_option('B', "second");
        q.set_option('A', "replaced");

        assert_eq!(q.options().len(), 2);
        assert_eq!(q.options()[0].label, 'A');
        assert_eq!(q.options()[0].text, "replaced");
        assert_eq!(q.option('B'), Some("second"));
        assert_eq!(q.option('C'), None);
    }

    #[test]
    fn test_parsed_quiz_assigns_answers_from_key() {
        let questions = vec![QuizQuestion::new("one"), QuizQuestion::new("two")];
        let key = BTreeMap::from([(1, 'C'), (5, 'A')]);
        let quiz = ParsedQuiz::new(questions, key);

        assert_eq!(quiz.questions()[0].answer(), Some('C'));
        assert_eq!(quiz.questions()[1].answer(), None);
        assert_eq!(quiz.unanswerable_questions(), vec![1]);
        assert_eq!(quiz.answer_key().get(&5), Some(&'A'));
    }

    #[test]
    fn test_record_flattens_result() {
        let record = QuizResultRecord {
            id: "r1".to_string(),
            student_id: "s1".to_string(),
            result: QuizResult {
                subject: "Operating Systems".to_string(),
                score: 3,
                total: 4,
                percentage: 75.0,
                correct_answers: 3,
                incorrect_answers: 1,
            },
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["subject"], "Operating Systems");
        assert_eq!(json["correct_answers"], 3);
        assert!(record.to_result().passed(75.0));
    }
}
