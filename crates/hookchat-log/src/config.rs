use crate::Severity;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_LOG_DIRECTORY: &str = "logs";
pub const DEFAULT_FILE_PREFIX: &str = "hookchat";
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 5;

/// File and console settings for a [`crate::Logger`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerConfig {
    pub enabled: bool,
    pub log_directory: PathBuf,
    pub file_prefix: String,
    pub max_file_size_bytes: u64,
    pub max_files: usize,
    pub console_mirror: bool,
    pub min_severity: Severity,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_files: DEFAULT_MAX_FILES,
            console_mirror: true,
            min_severity: Severity::Info,
        }
    }
}
