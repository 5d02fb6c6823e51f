//! Error taxonomy for webhook calls plus configuration errors.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Shown when an attempt never produced an outcome at all.
pub const UNREACHABLE_SERVER_MESSAGE: &str =
    "Could not reach the server. Please try again in a few moments.";

/// Closed classification of every failure a send can end with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Network,
    Server,
    Timeout,
    Auth,
    RateLimit,
    Validation,
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        Self::Network,
        Self::Server,
        Self::Timeout,
        Self::Auth,
        Self::RateLimit,
        Self::Validation,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "NETWORK",
            Self::Server => "SERVER",
            Self::Timeout => "TIMEOUT",
            Self::Auth => "AUTH",
            Self::RateLimit => "RATE_LIMIT",
            Self::Validation => "VALIDATION",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Maps an HTTP status to a failure kind. `None` for 2xx.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            400 => Some(Self::Validation),
            401 | 403 => Some(Self::Auth),
            429 => Some(Self::RateLimit),
            500.. => Some(Self::Server),
            _ => Some(Self::Unknown),
        }
    }

    /// Final, non-technical copy shown to the end user.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Network => {
                "Unable to connect. Please check your internet connection and try again."
            }
            Self::Server => "The server is having trouble right now. Please try again shortly.",
            Self::Timeout => "The server took too long to respond. Please try again.",
            Self::Auth => "You are not authorized to use this chat. Please check your access.",
            Self::RateLimit => {
                "Too many messages in a short time. Please wait a moment before trying again."
            }
            Self::Validation => "Your message could not be sent. Please check it and try again.",
            Self::Unknown => "Something went wrong. Please try again.",
        }
    }

    /// Transient copy shown while another attempt is pending.
    pub fn retrying_message(self) -> &'static str {
        match self {
            Self::Network => "Connection problem. Trying again...",
            Self::Server => "The server is having trouble. Trying again...",
            Self::Timeout => "The server is taking a while. Trying again...",
            Self::RateLimit => "The server is busy. Trying again shortly...",
            Self::Auth | Self::Validation | Self::Unknown => {
                "Something went wrong. Trying again..."
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure. The kind and user message are fixed at creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: String,
}

impl ErrorEnvelope {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.user_message().to_string(),
            developer_message: None,
            status: None,
            details: None,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn validation(developer_message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation).with_developer_message(developer_message)
    }

    /// Fallback used when no attempt returned an outcome.
    pub fn unreachable(developer_message: impl Into<String>) -> Self {
        Self {
            message: UNREACHABLE_SERVER_MESSAGE.to_string(),
            ..Self::new(ErrorKind::Unknown).with_developer_message(developer_message)
        }
    }

    pub fn with_developer_message(mut self, message: impl Into<String>) -> Self {
        self.developer_message = Some(message.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config {} failed: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config failed: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
