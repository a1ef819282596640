//! 教学大纲与科目命令

use super::AppState;
use crate::services::session::SubjectCatalog;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// 从 JSON 文件导入教学大纲
pub fn import_syllabus_file(state: &AppState, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read syllabus file {}", path.display()))?;

    let imported = state
        .db
        .import_syllabus_json(&content)
        .with_context(|| format!("Failed to import syllabus from {}", path.display()))?;

    Ok(imported)
}

/// 输出可选科目
pub fn list_subjects<W: Write>(state: &AppState, json: bool, out: &mut W) -> Result<Vec<String>> {
    let subjects = state.db.list_subjects()?;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&subjects)?)?;
    } else if subjects.is_empty() {
        writeln!(out, "No subjects available. Import a syllabus first.")?;
    } else {
        for subject in &subjects {
            writeln!(out, "{}", subject)?;
        }
    }

    Ok(subjects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::services::database::DatabaseService;

    fn state() -> AppState {
        AppState::new(DatabaseService::open_in_memory().unwrap(), AppConfig::default())
    }

    #[test]
    fn test_import_and_list() {
        let state = state();
        let path = std::env::temp_dir().join(format!("syllabus-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{"sem1": {"CS1": {"title": "Operating Systems"}, "CS2": {"title": "Compilers"}}}"#,
        )
        .unwrap();

        let imported = import_syllabus_file(&state, &path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let mut out = Vec::new();
        let subjects = list_subjects(&state, false, &mut out).unwrap();
        assert_eq!(imported, 2);
        assert_eq!(subjects, vec!["Compilers", "Operating Systems"]);
        assert_eq!(String::from_utf8(out).unwrap(), "Compilers\nOperating Systems\n");
    }

    #[test]
    fn test_missing_file() {
        let state = state();
        let err = import_syllabus_file(&state, Path::new("/nonexistent/syllabus.json")).unwrap_err();

        assert!(err.to_string().contains("Failed to read syllabus file"));
    }

    #[test]
    fn test_empty_catalog_message() {
        let mut out = Vec::new();
        list_subjects(&state(), false, &mut out).unwrap();

        assert!(String::from_utf8(out).unwrap().contains("Import a syllabus"));
    }
}
