use crate::errors::ConfigError;
use crate::executor::DEFAULT_MESSAGE_FIELD;
use crate::retry::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS, RetryPolicy};
use hookchat_log::{LoggerConfig, Severity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Everything a host needs to wire a [`crate::ChatClient`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfig {
    #[serde(flatten)]
    pub logging: LoggerConfig,
    pub webhook_url: String,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub message_field: String,
    pub verbose: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            logging: LoggerConfig::default(),
            webhook_url: String::new(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            message_field: DEFAULT_MESSAGE_FIELD.to_string(),
            verbose: false,
        }
    }
}

impl ChatConfig {
    /// Defaults overlaid with `HOOKCHAT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw)
            .map_err(|err| ConfigError::Parse(format!("{}: {err}", path.display())))
    }

    /// Overlays values found through `lookup`. Unset or blank keys are skipped.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = get("HOOKCHAT_WEBHOOK_URL") {
            self.webhook_url = value;
        }
        if let Some(value) = get("HOOKCHAT_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_number("HOOKCHAT_REQUEST_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = get("HOOKCHAT_MAX_RETRIES") {
            self.max_retries = parse_number("HOOKCHAT_MAX_RETRIES", &value)?;
        }
        if let Some(value) = get("HOOKCHAT_RETRY_DELAY_MS") {
            self.retry_delay_ms = parse_number("HOOKCHAT_RETRY_DELAY_MS", &value)?;
        }
        if let Some(value) = get("HOOKCHAT_MESSAGE_FIELD") {
            self.message_field = value;
        }
        if let Some(value) = get("HOOKCHAT_VERBOSE") {
            self.verbose = parse_flag("HOOKCHAT_VERBOSE", &value)?;
        }

        if let Some(value) = get("HOOKCHAT_LOG_ENABLED") {
            self.logging.enabled = parse_flag("HOOKCHAT_LOG_ENABLED", &value)?;
        }
        if let Some(value) = get("HOOKCHAT_LOG_DIRECTORY") {
            self.logging.log_directory = PathBuf::from(value);
        }
        if let Some(value) = get("HOOKCHAT_LOG_FILE_PREFIX") {
            self.logging.file_prefix = value;
        }
        if let Some(value) = get("HOOKCHAT_LOG_MAX_FILE_SIZE_BYTES") {
            self.logging.max_file_size_bytes =
                parse_number("HOOKCHAT_LOG_MAX_FILE_SIZE_BYTES", &value)?;
        }
        if let Some(value) = get("HOOKCHAT_LOG_MAX_FILES") {
            self.logging.max_files = parse_number("HOOKCHAT_LOG_MAX_FILES", &value)?;
        }
        if let Some(value) = get("HOOKCHAT_LOG_CONSOLE") {
            self.logging.console_mirror = parse_flag("HOOKCHAT_LOG_CONSOLE", &value)?;
        }
        if let Some(value) = get("HOOKCHAT_LOG_MIN_SEVERITY") {
            self.logging.min_severity = value.parse::<Severity>().map_err(|err| {
                ConfigError::Invalid(format!("HOOKCHAT_LOG_MIN_SEVERITY: {err}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook_url.trim().is_empty() {
            return Err(ConfigError::Invalid("webhook url is not set".to_string()));
        }
        let url = reqwest::Url::parse(self.webhook_url.trim()).map_err(|err| {
            ConfigError::Invalid(format!("webhook url '{}': {err}", self.webhook_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "webhook url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.message_field.trim().is_empty() {
            return Err(ConfigError::Invalid("message field is empty".to_string()));
        }
        if self.logging.file_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("log file prefix is empty".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            ..RetryPolicy::default()
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|err| ConfigError::Invalid(format!("{key}='{value}': {err}")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!(
            "{key}='{value}': expected a boolean"
        ))),
    }
}
