use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::client::DEFAULT_API_BASE;
use crate::ingest::{IngestOptions, MalformedPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be true or false, got '{value}'")]
    InvalidBool { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base: String,
    pub user_agent: String,
    pub db_path: PathBuf,
    pub pool_size: u32,
    pub log_level: String,
    pub ingest: IngestOptions,
}

impl Settings {
    /// Reads settings from the process environment, after loading `.env` if
    /// there is one.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base = lookup("HH_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let user_agent = lookup("HH_USER_AGENT")
            .unwrap_or_else(|| format!("hh-harvest/{}", env!("CARGO_PKG_VERSION")));
        let db_path = lookup("HH_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);
        let log_level = lookup("HH_LOG").unwrap_or_else(|| "info".to_string());

        let per_page = parse_number(&lookup, "HH_PER_PAGE", 10)?;
        let workers = parse_number(&lookup, "HH_WORKERS", 4)?;
        let pool_size = parse_number(&lookup, "HH_POOL_SIZE", 4)?;
        let malformed = if parse_bool(&lookup, "HH_SKIP_MALFORMED", false)? {
            MalformedPolicy::Skip
        } else {
            MalformedPolicy::Abort
        };

        Ok(Self {
            api_base,
            user_agent,
            db_path,
            pool_size,
            log_level,
            ingest: IngestOptions {
                per_page,
                workers: workers as usize,
                malformed,
            },
        })
    }
}

fn default_db_path() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "hh-harvest") {
        proj_dirs.data_dir().join("hh-harvest.db")
    } else {
        PathBuf::from("hh-harvest.db")
    }
}

fn parse_number(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u32,
) -> Result<u32, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidNumber { var, value }),
        },
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::InvalidBool { var, value }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.api_base, "https://api.hh.ru");
        assert!(settings.user_agent.starts_with("hh-harvest/"));
        assert!(settings.db_path.ends_with("hh-harvest.db"));
        assert_eq!(settings.pool_size, 4);
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.ingest.per_page, 10);
        assert_eq!(settings.ingest.workers, 4);
        assert_eq!(settings.ingest.malformed, MalformedPolicy::Abort);
    }

    #[test]
    fn test_overrides() {
        let settings = settings_from(&[
            ("HH_API_BASE", "http://localhost:8080"),
            ("HH_DB_PATH", "/tmp/hh.db"),
            ("HH_PER_PAGE", "50"),
            ("HH_WORKERS", "8"),
            ("HH_SKIP_MALFORMED", "yes"),
        ])
        .unwrap();
        assert_eq!(settings.api_base, "http://localhost:8080");
        assert_eq!(settings.db_path, PathBuf::from("/tmp/hh.db"));
        assert_eq!(settings.ingest.per_page, 50);
        assert_eq!(settings.ingest.workers, 8);
        assert_eq!(settings.ingest.malformed, MalformedPolicy::Skip);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = settings_from(&[("HH_WORKERS", "many")]).unwrap_err();
        assert!(err.to_string().contains("HH_WORKERS"));

        let err = settings_from(&[("HH_PER_PAGE", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { var: "HH_PER_PAGE", .. }));

        let err = settings_from(&[("HH_SKIP_MALFORMED", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBool { .. }));
    }
}
