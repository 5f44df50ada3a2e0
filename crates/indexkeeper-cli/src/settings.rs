//! Layered global settings
//!
//! Defaults, then an optional TOML file, then `INDEXKEEPER_*` environment
//! variables. Command line flags are applied on top by the router.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use indexkeeper_http::HttpConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Settings file looked up in the working directory when `--config` is not given
pub const DEFAULT_SETTINGS_FILE: &str = "indexkeeper.toml";

/// Prefix of the environment variables read into [`Settings`]
pub const ENV_PREFIX: &str = "INDEXKEEPER";

/// Global settings shared by every command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Cluster endpoint
    pub url: String,
    /// Request timeout in seconds
    pub timeout: u64,
    /// Connect timeout in seconds
    pub connect_timeout: u64,
    /// Retries for idempotent reads
    pub retry_count: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// HTTP/HTTPS proxy URL
    pub proxy: Option<String>,
    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            timeout: 30,
            connect_timeout: 10,
            retry_count: 3,
            retry_delay_ms: 500,
            proxy: None,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (required when given) or the default file, plus the process environment
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        Self::load_from(path, None)
    }

    /// Like [`Settings::load`] with an explicit environment map instead of the process environment
    pub fn load_from(path: Option<&Path>, env: Option<HashMap<String, String>>) -> CliResult<Self> {
        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
        };
        if required && !file.exists() {
            return Err(CliError::Config(format!(
                "settings file {} does not exist",
                file.display()
            )));
        }

        let config = Config::builder()
            .add_source(File::from(file).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Override the cluster endpoint
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn validate(&self) -> CliResult<()> {
        if self.url.trim().is_empty() {
            return Err(CliError::Config("url must not be empty".to_string()));
        }
        if self.timeout == 0 {
            return Err(CliError::Config(
                "timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Transport configuration for these settings
    pub fn http_config(&self) -> HttpConfig {
        let mut config = HttpConfig::new()
            .with_base_url(self.url.clone())
            .with_timeout(Duration::from_secs(self.timeout))
            .with_retry_count(self.retry_count)
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms));
        config.connect_timeout = Duration::from_secs(self.connect_timeout);
        if let Some(proxy) = &self.proxy {
            config = config.with_proxy(proxy.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env() -> Option<HashMap<String, String>> {
        Some(HashMap::new())
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            Settings::load_from(Some(&missing), no_env()),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        let settings = Settings::load_from(Some(file.path()), no_env()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.http_config().timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_file_then_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "url = \"http://search.internal:9200\"\ntimeout = 120\nlog_level = \"debug\"").unwrap();

        let mut env = HashMap::new();
        env.insert("INDEXKEEPER_TIMEOUT".to_string(), "45".to_string());
        env.insert("INDEXKEEPER_RETRY_COUNT".to_string(), "0".to_string());

        let settings = Settings::load_from(Some(file.path()), Some(env)).unwrap();
        assert_eq!(settings.url, "http://search.internal:9200");
        assert_eq!(settings.timeout, 45);
        assert_eq!(settings.retry_count, 0);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.connect_timeout, 10);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "timeout = 0").unwrap();
        let result = Settings::load_from(Some(file.path()), no_env());
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_http_config_mapping() {
        let settings = Settings {
            proxy: Some("http://proxy:3128".to_string()),
            retry_delay_ms: 250,
            ..Settings::default()
        }
        .with_url("http://other:9200");
        let http = settings.http_config();
        assert_eq!(http.base_url, "http://other:9200");
        assert_eq!(http.retry_delay, Duration::from_millis(250));
        assert_eq!(http.proxy.as_deref(), Some("http://proxy:3128"));
    }
}
