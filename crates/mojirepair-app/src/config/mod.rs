//! Configuration loading and XDG path helpers.
//!
//! Sources are layered lowest to highest priority:
//! built-in defaults, `$XDG_CONFIG_HOME/mojirepair/settings.toml`,
//! `./config/settings.*`, the file named by `MOJIREPAIR_CONFIG_FILE`, and
//! `MOJIREPAIR__SECTION__KEY` environment variables. Credentials missing from
//! all of those fall back to the conventional `SUPABASE_*` and Gemini
//! variables.

use std::{env, path::PathBuf};

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::constants::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_LENGTH_TOLERANCE,
    DEFAULT_ORACLE_COOLDOWN_MS, DEFAULT_PAGE_SIZE, DEFAULT_TABLE,
};
use crate::text::CorrectionRule;

const LOCAL_CONFIG_FILE: &str = "config/settings";
const SETTINGS_FILE_NAME: &str = "settings.toml";
const CONFIG_FILE_ENV: &str = "MOJIREPAIR_CONFIG_FILE";
const ENV_PREFIX: &str = "MOJIREPAIR";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("unable to resolve project directories")]
    MissingProjectDirs,
    #[error(transparent)]
    Build(#[from] config::ConfigError),
    #[error("missing required setting `{key}` (or environment variable {fallback})")]
    Missing {
        key: &'static str,
        fallback: &'static str,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub oracle: OracleConfig,
    pub repair: RepairConfig,
    /// Extra substitutions appended after the built-in dictionary.
    #[serde(default)]
    pub corrections: Vec<CorrectionRule>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub table: String,
    pub requests_per_second: u32,
    pub fetch_attempts: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub cooldown_ms: u64,
    pub length_tolerance: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepairConfig {
    pub page_size: usize,
    pub start_offset: usize,
    pub include_descriptions: bool,
}

impl StoreConfig {
    pub fn url(&self) -> Result<&str, AppConfigError> {
        non_empty(self.url.as_deref()).ok_or(AppConfigError::Missing {
            key: "store.url",
            fallback: "SUPABASE_URL",
        })
    }

    pub fn api_key(&self) -> Result<&str, AppConfigError> {
        non_empty(self.api_key.as_deref()).ok_or(AppConfigError::Missing {
            key: "store.api_key",
            fallback: "SUPABASE_KEY",
        })
    }
}

impl OracleConfig {
    pub fn api_key(&self) -> Result<&str, AppConfigError> {
        non_empty(self.api_key.as_deref()).ok_or(AppConfigError::Missing {
            key: "oracle.api_key",
            fallback: "GEMINI_API_KEY",
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn load() -> Result<AppConfig, AppConfigError> {
    let mut builder = Config::builder()
        .set_default("store.table", DEFAULT_TABLE)?
        .set_default("store.requests_per_second", 10)?
        .set_default("store.fetch_attempts", 3)?
        .set_default("oracle.enabled", true)?
        .set_default("oracle.base_url", DEFAULT_GEMINI_BASE_URL)?
        .set_default("oracle.model", DEFAULT_GEMINI_MODEL)?
        .set_default("oracle.cooldown_ms", DEFAULT_ORACLE_COOLDOWN_MS)?
        .set_default("oracle.length_tolerance", DEFAULT_LENGTH_TOLERANCE as u64)?
        .set_default("oracle.timeout_secs", 60)?
        .set_default("repair.page_size", DEFAULT_PAGE_SIZE as u64)?
        .set_default("repair.start_offset", 0)?
        .set_default("repair.include_descriptions", false)?;

    if let Some(path) = user_config_file() {
        builder = builder.add_source(File::from(path).required(false));
    }
    builder = builder.add_source(File::with_name(LOCAL_CONFIG_FILE).required(false));
    if let Some(path) = env::var_os(CONFIG_FILE_ENV) {
        builder = builder.add_source(File::from(PathBuf::from(path)).required(true));
    }
    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut cfg: AppConfig = builder.build()?.try_deserialize()?;
    apply_credential_fallbacks(&mut cfg);
    Ok(cfg)
}

fn apply_credential_fallbacks(cfg: &mut AppConfig) {
    if cfg.store.url.is_none() {
        cfg.store.url = env::var("SUPABASE_URL").ok();
    }
    if cfg.store.api_key.is_none() {
        cfg.store.api_key = env::var("SUPABASE_KEY").ok();
    }
    if cfg.oracle.api_key.is_none() {
        cfg.oracle.api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("GOOGLE_AI_API_KEY"))
            .ok();
    }
}

pub fn project_dirs() -> Result<ProjectDirs, AppConfigError> {
    ProjectDirs::from("dev", "mojirepair", "mojirepair").ok_or(AppConfigError::MissingProjectDirs)
}

fn user_config_file() -> Option<PathBuf> {
    project_dirs()
        .ok()
        .map(|dirs| dirs.config_dir().join(SETTINGS_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: Option<&str>, key: Option<&str>) -> StoreConfig {
        StoreConfig {
            url: url.map(str::to_owned),
            api_key: key.map(str::to_owned),
            table: DEFAULT_TABLE.to_owned(),
            requests_per_second: 10,
            fetch_attempts: 3,
        }
    }

    #[test]
    fn blank_credentials_count_as_missing() {
        let cfg = store(Some("  "), None);
        assert!(matches!(
            cfg.url(),
            Err(AppConfigError::Missing {
                key: "store.url",
                ..
            })
        ));
        assert!(cfg.api_key().is_err());

        let cfg = store(Some("https://example.supabase.co"), Some("anon"));
        assert_eq!(cfg.url().expect("url"), "https://example.supabase.co");
        assert_eq!(cfg.api_key().expect("key"), "anon");
    }
}
