use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::client::{ClientConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use crate::llm::term_lookup::{LookupOptions, DEFAULT_MIN_REQUEST_INTERVAL, DEFAULT_TERM_CONCURRENCY};

pub const DEFAULT_CONFIG_FILE: &str = "studyweave.toml";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Environment variable consulted when no key is typed in or passed on the command line.
    pub api_key_env: String,
    pub term_concurrency: usize,
    pub min_request_interval_ms: u64,
    pub describe_terms: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            term_concurrency: DEFAULT_TERM_CONCURRENCY,
            min_request_interval_ms: DEFAULT_MIN_REQUEST_INTERVAL.as_millis() as u64,
            describe_terms: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "endpoint '{}' must be an http(s) URL",
                self.endpoint
            )));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".to_string()));
        }
        if self.term_concurrency == 0 {
            return Err(ConfigError::Invalid("term_concurrency must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn client_config(&self, api_key: &str) -> ClientConfig {
        ClientConfig {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_key: api_key.to_string(),
            timeout_secs: self.timeout_secs,
        }
    }

    pub fn lookup_options(&self) -> LookupOptions {
        LookupOptions {
            concurrency: self.term_concurrency,
            min_interval: Duration::from_millis(self.min_request_interval_ms),
        }
    }

    /// An explicit non-blank key wins; otherwise the configured environment variable.
    pub fn resolve_api_key(&self, explicit: Option<&str>) -> Option<String> {
        if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
            return Some(key.to_string());
        }
        match env::var(&self.api_key_env) {
            Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
            _ => None,
        }
    }
}

pub fn load_config_from_file(file_path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(file_path).map_err(|source| ConfigError::Read {
        path: file_path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str::<Config>(&contents).map_err(|e| ConfigError::Parse {
        path: file_path.to_path_buf(),
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads `explicit` if given, else `studyweave.toml` when present, else defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return load_config_from_file(path);
    }
    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.is_file() {
        tracing::info!(path = %default_path.display(), "loading configuration");
        load_config_from_file(default_path)
    } else {
        tracing::debug!("no {} found; using defaults", DEFAULT_CONFIG_FILE);
        Ok(Config::default())
    }
}
