//! Webhook chat client core.
//!
//! A [`WebhookExecutor`] performs one POST under a hard timeout and turns
//! every outcome into an [`OutcomeEnvelope`]. A [`RetryOrchestrator`] repeats
//! transient failures with linear backoff and reports progress through a
//! [`RetryEventSink`]. [`format_response`] maps the loosely shaped body to a
//! [`DisplayPayload`], and [`ChatClient`] wires the three together.

pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod executor;
pub mod format;
pub mod retry;
pub mod session;
pub mod testing;
pub mod types;

pub use client::{ChatClient, ChatReply};
pub use config::{ChatConfig, DEFAULT_REQUEST_TIMEOUT_MS};
pub use errors::{ConfigError, ErrorEnvelope, ErrorKind, UNREACHABLE_SERVER_MESSAGE};
pub use events::{
    RetryEvent, RetryEventObserver, RetryEventReceiver, RetryEventSender, RetryEventSink,
    SharedRetryEventObserver, retry_event_channel,
};
pub use executor::{
    DEFAULT_MESSAGE_FIELD, RequestExecutor, WebhookExecutor, parse_body, validate_input,
};
pub use format::{DisplayPayload, FALLBACK_REPLY_TEXT, format_response, format_response_logged};
pub use retry::{
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS, RetryOrchestrator, RetryPolicy,
    default_retryable_kinds,
};
pub use session::{
    FileSessionStore, MemorySessionStore, SESSION_STORAGE_KEY, SessionStore, new_session_id,
};
pub use types::{Diagnostics, EMPTY_REPLY_PLACEHOLDER, OutcomeEnvelope, WebhookPayload};

pub use hookchat_log::{Logger, LoggerConfig, Severity};
