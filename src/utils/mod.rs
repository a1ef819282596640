use std::path::PathBuf;

const APP_DIR_NAME: &str = "study-portal";

pub fn get_app_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => {
            let mut path = PathBuf::from(home);
            path.push(".local/share");
            path.push(APP_DIR_NAME);
            path
        }
        None => PathBuf::from(".").join(APP_DIR_NAME),
    }
}

pub fn get_database_path() -> PathBuf {
    let mut path = get_app_data_dir();
    path.push("study_portal.db");
    path
}
