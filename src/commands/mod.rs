// 命令模块
// 供 CLI 调用的命令接口，负责把服务层组装起来并输出结果

pub mod assistant;
pub mod history;
pub mod quiz;
pub mod syllabus;

use crate::config::AppConfig;
use crate::services::database::DatabaseService;

/// 命令共享状态（显式传入，不依赖全局当前用户）
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: DatabaseService, config: AppConfig) -> Self {
        Self { db, config }
    }
}

pub use assistant::{
    code_solution, exam_strategy, resolve_exercise, run_tutor, struggling_subjects, study_plan,
    syllabus_context,
};
pub use history::{show_history, show_result, HistoryDto, QuizResultDto};
pub use quiz::run_quiz;
pub use syllabus::{import_syllabus_file, list_subjects};
