//! 应用配置
//! 从环境变量读取（支持 .env），缺省或无效时回退到默认值

use crate::services::llm::LlmConfig;
use crate::services::scoring::DEFAULT_PASS_MARK;
use crate::utils::get_database_path;
use log::warn;
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_DB: &str = "STUDY_PORTAL_DB";
pub const ENV_LLM_URL: &str = "STUDY_PORTAL_LLM_URL";
pub const ENV_LLM_TIMEOUT_SECS: &str = "STUDY_PORTAL_LLM_TIMEOUT_SECS";
pub const ENV_LLM_TEMPERATURE: &str = "STUDY_PORTAL_LLM_TEMPERATURE";
pub const ENV_LLM_MAX_TOKENS: &str = "STUDY_PORTAL_LLM_MAX_TOKENS";
pub const ENV_PASS_MARK: &str = "STUDY_PORTAL_PASS_MARK";
pub const ENV_QUESTIONS: &str = "STUDY_PORTAL_QUESTIONS";
pub const ENV_LOG: &str = "STUDY_PORTAL_LOG";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub llm: LlmConfig,
    pub pass_mark: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: get_database_path(),
            llm: LlmConfig::default(),
            pass_mark: DEFAULT_PASS_MARK,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意查找函数构造，便于测试
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let llm_defaults = defaults.llm.clone();

        let llm = LlmConfig {
            base_url: lookup(ENV_LLM_URL)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(llm_defaults.base_url),
            max_tokens: parse_or(&lookup, ENV_LLM_MAX_TOKENS, llm_defaults.max_tokens),
            temperature: parse_or(&lookup, ENV_LLM_TEMPERATURE, llm_defaults.temperature),
            request_timeout_secs: parse_or(
                &lookup,
                ENV_LLM_TIMEOUT_SECS,
                llm_defaults.request_timeout_secs,
            ),
            question_count: parse_or(&lookup, ENV_QUESTIONS, llm_defaults.question_count),
        };

        Self {
            database_path: lookup(ENV_DB)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            llm,
            pass_mark: parse_or(&lookup, ENV_PASS_MARK, defaults.pass_mark),
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value {:?} for {}", raw, key);
            default
        }),
        None => default,
    }
}
