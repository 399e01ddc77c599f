use crate::error::CdrError;
use crate::parsing::normalize::DEFAULT_COUNTRY_CODE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATABASE_PATH: &str = "cdr_data.db";
pub const DEFAULT_BASE_URL: &str = "https://webexapis.com/v1";

/// Runtime settings, loaded from an optional TOML file. Every field has a
/// default so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    /// Downloaded remote reports are kept here when set.
    pub archive_dir: Option<PathBuf>,
    pub country_code: String,
    pub remote: RemoteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            archive_dir: None,
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
            remote: RemoteConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub poll_interval_secs: u64,
    pub max_wait_secs: u64,
    pub request_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_secs: 5,
            max_wait_secs: 300,
            request_timeout_secs: 30,
            download_timeout_secs: 60,
        }
    }
}

impl RemoteConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Load a config from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, CdrError> {
    let content = std::fs::read_to_string(path).map_err(|e| CdrError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_config(&content, path)
}

/// Parse a config from a TOML string.
pub fn parse_config(text: &str, source: &Path) -> Result<Config, CdrError> {
    let config: Config = toml::from_str(text).map_err(|e| CdrError::Config {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    validate_config(&config, source)?;
    Ok(config)
}

fn validate_config(config: &Config, source: &Path) -> Result<(), CdrError> {
    let invalid = |reason: &str| CdrError::Config {
        path: source.to_path_buf(),
        reason: reason.to_string(),
    };

    if config.country_code.is_empty() || !config.country_code.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("country_code must be one or more digits"));
    }
    if config.remote.poll_interval_secs == 0 {
        return Err(invalid("remote.poll_interval_secs must be greater than zero"));
    }
    if config.remote.base_url.trim().is_empty() {
        return Err(invalid("remote.base_url must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("", Path::new("cdrlens.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.remote.max_wait(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_override() {
        let text = r#"
database_path = "/var/lib/cdr/cdr.db"
archive_dir = "reports"

[remote]
poll_interval_secs = 2
"#;
        let config = parse_config(text, Path::new("cdrlens.toml")).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/cdr/cdr.db"));
        assert_eq!(config.archive_dir, Some(PathBuf::from("reports")));
        assert_eq!(config.remote.poll_interval_secs, 2);
        assert_eq!(config.remote.max_wait_secs, 300);
        assert_eq!(config.country_code, "1");
    }

    #[test]
    fn test_invalid_toml_names_path() {
        let err = parse_config("database_path = [", Path::new("bad.toml")).unwrap_err();
        match err {
            CdrError::Config { path, .. } => assert_eq!(path, PathBuf::from("bad.toml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let text = "[remote]\npoll_interval_secs = 0\n";
        assert!(parse_config(text, Path::new("c.toml")).is_err());
    }

    #[test]
    fn test_rejects_non_numeric_country_code() {
        assert!(parse_config("country_code = \"+1\"", Path::new("c.toml")).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/cdrlens.toml")).unwrap_err();
        assert!(matches!(err, CdrError::Config { .. }));
    }
}
