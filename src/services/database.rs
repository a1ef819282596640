// 数据库服务模块
// 提供 SQLite 存储：测验历史（只追加）与教学大纲科目目录

use crate::error::{QuizError, Result};
use crate::models::{QuizResult, QuizResultRecord, Syllabus, SyllabusCourse};
use crate::services::session::{ResultStore, SubjectCatalog};
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use log::{debug, info};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// 数据库服务
#[derive(Clone)]
pub struct DatabaseService {
    pool: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// 打开（或创建）指定路径的数据库
    pub fn open(db_path: &Path) -> Result<Self> {
        // 确保数据目录存在
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        let service = Self {
            pool: Arc::new(Mutex::new(conn)),
            db_path: Some(db_path.to_path_buf()),
        };
        service.initialize()?;
        info!("Opened database at {}", db_path.display());
        Ok(service)
    }

    /// 内存数据库（测试与临时会话）
    pub fn open_in_memory() -> Result<Self> {
        let service = Self {
            pool: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            db_path: None,
        };
        service.initialize()?;
        Ok(service)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.pool
            .lock()
            .map_err(|_| QuizError::Persistence("database lock poisoned".to_string()))
    }

    /// 初始化数据库表结构
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS quiz_results (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                student_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                score INTEGER NOT NULL,
                total INTEGER NOT NULL CHECK(total > 0),
                percentage REAL NOT NULL,
                correct_answers INTEGER NOT NULL,
                incorrect_answers INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                CHECK(correct_answers + incorrect_answers = total)
            );

            CREATE INDEX IF NOT EXISTS idx_quiz_results_student
                ON quiz_results(student_id, created_at);

            CREATE TABLE IF NOT EXISTS syllabus_courses (
                semester TEXT NOT NULL,
                course_code TEXT NOT NULL,
                title TEXT NOT NULL,
                category TEXT,
                units TEXT NOT NULL DEFAULT '[]',
                exercises TEXT NOT NULL DEFAULT '[]',
                options TEXT NOT NULL DEFAULT '[]',
                PRIMARY KEY (semester, course_code)
            );
        ",
        )?;

        Ok(())
    }

    // ==================== 测验历史 ====================

    /// 追加一条测验结果，时间戳在此分配且对每个学生严格递增
    pub fn insert_quiz_result(&self, student_id: &str, result: &QuizResult) -> Result<QuizResultRecord> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let last: Option<String> = tx
            .query_row(
                "SELECT MAX(created_at) FROM quiz_results WHERE student_id = ?",
                rusqlite::params![student_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        let mut timestamp = Utc::now().trunc_subsecs(6);
        if let Some(last) = last.and_then(|s| s.parse::<DateTime<Utc>>().ok()) {
            if timestamp <= last {
                timestamp = last + Duration::microseconds(1);
            }
        }

        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO quiz_results
             (id, student_id, subject, score, total, percentage,
              correct_answers, incorrect_answers, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                id,
                student_id,
                result.subject,
                result.score,
                result.total,
                result.percentage,
                result.correct_answers,
                result.incorrect_answers,
                format_timestamp(&timestamp),
            ],
        )?;
        tx.commit()?;

        debug!("Saved quiz result {} for student {}", id, student_id);
        Ok(QuizResultRecord {
            id,
            student_id: student_id.to_string(),
            result: result.clone(),
            timestamp,
        })
    }

    /// 学生的测验历史，最新在前
    pub fn get_quiz_results(&self, student_id: &str) -> Result<Vec<QuizResultRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, student_id, subject, score, total, percentage,
                    correct_answers, incorrect_answers, created_at
             FROM quiz_results WHERE student_id = ?
             ORDER BY created_at DESC, seq DESC",
        )?;

        let rows = stmt.query_map(rusqlite::params![student_id], Self::row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    /// 获取单条记录
    pub fn get_quiz_result(&self, id: &str) -> Result<Option<QuizResultRecord>> {
        let conn = self.conn()?;

        let record = conn
            .query_row(
                "SELECT id, student_id, subject, score, total, percentage,
                        correct_answers, incorrect_answers, created_at
                 FROM quiz_results WHERE id = ?",
                rusqlite::params![id],
                Self::row_to_record,
            )
            .optional()?;

        Ok(record)
    }

    // ==================== 教学大纲 ====================

    /// 导入教学大纲，同一学期同一课程代码覆盖旧数据
    pub fn import_syllabus(&self, syllabus: &Syllabus) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut imported = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO syllabus_courses
                 (semester, course_code, title, category, units, exercises, options)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )?;

            for (semester, courses) in syllabus {
                for (code, course) in courses {
                    stmt.execute(rusqlite::params![
                        semester,
                        code,
                        course.title,
                        course.category,
                        serde_json::to_string(&course.units)?,
                        serde_json::to_string(&course.exercises)?,
                        serde_json::to_string(&course.options)?,
                    ])?;
                    imported += 1;
                }
            }
        }

        tx.commit()?;
        info!("Imported {} syllabus courses", imported);
        Ok(imported)
    }

    /// 从 JSON 文本导入教学大纲
    pub fn import_syllabus_json(&self, json: &str) -> Result<usize> {
        let syllabus: Syllabus = serde_json::from_str(json)?;
        self.import_syllabus(&syllabus)
    }

    /// 所有课程标题，去重并排序
    pub fn get_subjects(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT DISTINCT title FROM syllabus_courses
             WHERE TRIM(title) <> '' ORDER BY title",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut subjects = Vec::new();
        for row in rows {
            subjects.push(row?);
        }

        Ok(subjects)
    }

    /// 按学期和课程代码顺序返回全部课程
    pub fn get_courses(&self) -> Result<Vec<SyllabusCourse>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT title, category, units, exercises, options FROM syllabus_courses
             ORDER BY semester, course_code",
        )?;
        let rows = stmt.query_map([], Self::row_to_course)?;

        let mut courses = Vec::new();
        for row in rows {
            courses.push(row?);
        }

        Ok(courses)
    }

    /// 按标题查找课程，标题重复时取第一门
    pub fn find_course(&self, title: &str) -> Result<Option<SyllabusCourse>> {
        let conn = self.conn()?;

        let course = conn
            .query_row(
                "SELECT title, category, units, exercises, options FROM syllabus_courses
                 WHERE title = ? ORDER BY semester, course_code LIMIT 1",
                rusqlite::params![title],
                Self::row_to_course,
            )
            .optional()?;

        Ok(course)
    }

    // ==================== 辅助方法 ====================

    /// 从数据库行转换为 QuizResultRecord
    fn row_to_record(row: &Row) -> rusqlite::Result<QuizResultRecord> {
        let created_at: String = row.get(8)?;
        let timestamp = created_at
            .parse::<DateTime<Utc>>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

        Ok(QuizResultRecord {
            id: row.get(0)?,
            student_id: row.get(1)?,
            result: QuizResult {
                subject: row.get(2)?,
                score: row.get(3)?,
                total: row.get(4)?,
                percentage: row.get(5)?,
                correct_answers: row.get(6)?,
                incorrect_answers: row.get(7)?,
            },
            timestamp,
        })
    }

    fn row_to_course(row: &Row) -> rusqlite::Result<SyllabusCourse> {
        Ok(SyllabusCourse {
            title: row.get(0)?,
            category: row.get(1)?,
            units: json_column(row, 2)?,
            exercises: json_column(row, 3)?,
            options: json_column(row, 4)?,
        })
    }
}

fn json_column(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// 固定微秒精度，保证字符串排序与时间顺序一致
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl ResultStore for DatabaseService {
    fn save_quiz_result(&self, student_id: &str, result: &QuizResult) -> Result<QuizResultRecord> {
        self.insert_quiz_result(student_id, result)
    }

    fn list_quiz_results(&self, student_id: &str) -> Result<Vec<QuizResultRecord>> {
        self.get_quiz_results(student_id)
    }
}

impl SubjectCatalog for DatabaseService {
    fn list_subjects(&self) -> Result<Vec<String>> {
        self.get_subjects()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(subject: &str, correct: u32, total: u32) -> QuizResult {
        QuizResult {
            subject: subject.to_string(),
            score: correct,
            total,
            percentage: correct as f64 / total as f64 * 100.0,
            correct_answers: correct,
            incorrect_answers: total - correct,
        }
    }

    const SYLLABUS: &str = r#"{
        "semester1": {
            "CS101": { "title": "Programming in C", "units": ["Basics", "Pointers"] },
            "CS102": { "title": "Digital Electronics", "category": "core" }
        },
        "semester2": {
            "CS201": { "title": "Data Structures" },
            "CS202": { "title": "Programming in C" },
            "CS203": { "title": "  " }
        }
    }"#;

    #[test]
    fn test_save_and_list_most_recent_first() {
        let db = DatabaseService::open_in_memory().unwrap();
        db.save_quiz_result("s1", &result("Networks", 10, 15)).unwrap();
        db.save_quiz_result("s1", &result("Compilers", 15, 15)).unwrap();
        db.save_quiz_result("s2", &result("Databases", 3, 15)).unwrap();

        let history = db.list_quiz_results("s1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].result.subject, "Compilers");
        assert_eq!(history[1].result.subject, "Networks");
        assert!(history[0].timestamp > history[1].timestamp);
        assert_eq!(db.list_quiz_results("s2").unwrap().len(), 1);
        assert!(db.list_quiz_results("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let db = DatabaseService::open_in_memory().unwrap();
        let mut records = Vec::new();
        for _ in 0..20 {
            records.push(db.save_quiz_result("s1", &result("OS", 1, 2)).unwrap());
        }

        for pair in records.windows(2) {
            assert!(pair[1].timestamp > pair[0].timestamp);
        }
    }

    #[test]
    fn test_record_round_trip() {
        let db = DatabaseService::open_in_memory().unwrap();
        let saved = db.save_quiz_result("s1", &result("Graphics", 7, 15)).unwrap();

        let loaded = db.get_quiz_result(&saved.id).unwrap().unwrap();
        assert_eq!(loaded.result, saved.result);
        assert_eq!(loaded.student_id, "s1");
        assert_eq!(
            format_timestamp(&loaded.timestamp),
            format_timestamp(&saved.timestamp)
        );
        assert!(db.get_quiz_result("missing").unwrap().is_none());
    }

    #[test]
    fn test_rejects_zero_total() {
        let db = DatabaseService::open_in_memory().unwrap();
        let bad = QuizResult {
            subject: "Empty".to_string(),
            score: 0,
            total: 0,
            percentage: 0.0,
            correct_answers: 0,
            incorrect_answers: 0,
        };

        assert!(matches!(
            db.save_quiz_result("s1", &bad),
            Err(QuizError::Database(_))
        ));
    }

    #[test]
    fn test_subject_catalog() {
        let db = DatabaseService::open_in_memory().unwrap();
        let imported = db.import_syllabus_json(SYLLABUS).unwrap();

        assert_eq!(imported, 5);
        assert_eq!(
            db.list_subjects().unwrap(),
            vec!["Data Structures", "Digital Electronics", "Programming in C"]
        );
    }

    #[test]
    fn test_reimport_replaces_course() {
        let db = DatabaseService::open_in_memory().unwrap();
        db.import_syllabus_json(SYLLABUS).unwrap();
        db.import_syllabus_json(r#"{"semester2": {"CS201": {"title": "Algorithms"}}}"#)
            .unwrap();

        let subjects = db.list_subjects().unwrap();
        assert!(subjects.contains(&"Algorithms".to_string()));
        assert!(!subjects.contains(&"Data Structures".to_string()));
    }

    #[test]
    fn test_find_course_prefers_earliest_semester() {
        let db = DatabaseService::open_in_memory().unwrap();
        db.import_syllabus_json(SYLLABUS).unwrap();

        let course = db.find_course("Programming in C").unwrap().unwrap();
        assert_eq!(course.units, vec!["Basics", "Pointers"]);
        assert_eq!(db.find_course("Digital Electronics").unwrap().unwrap().category.as_deref(), Some("core"));
        assert!(db.find_course("Astronomy").unwrap().is_none());
        assert_eq!(db.get_courses().unwrap().len(), 5);
    }

    #[test]
    fn test_invalid_syllabus_json() {
        let db = DatabaseService::open_in_memory().unwrap();

        assert!(matches!(
            db.import_syllabus_json("not json"),
            Err(QuizError::Serialization(_))
        ));
    }
}
