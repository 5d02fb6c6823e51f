//! Host-facing facade: executor, retries and formatting behind one call.

use crate::config::ChatConfig;
use crate::errors::ConfigError;
use crate::events::RetryEventSink;
use crate::executor::{RequestExecutor, WebhookExecutor};
use crate::format::{DisplayPayload, format_response_logged};
use crate::retry::{RetryOrchestrator, RetryPolicy};
use crate::types::OutcomeEnvelope;
use hookchat_log::Logger;
use serde::Serialize;

/// What a host shows after one send.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatReply {
    pub outcome: OutcomeEnvelope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayPayload>,
}

impl ChatReply {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Reply text on success, otherwise the friendly error copy.
    pub fn user_message(&self) -> &str {
        match (&self.display, self.outcome.error()) {
            (Some(display), _) => &display.text,
            (None, Some(error)) => &error.message,
            (None, None) => crate::format::FALLBACK_REPLY_TEXT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChatClient<E = WebhookExecutor> {
    orchestrator: RetryOrchestrator<E>,
    logger: Logger,
}

impl ChatClient<WebhookExecutor> {
    pub fn from_config(config: &ChatConfig, logger: Logger) -> Result<Self, ConfigError> {
        config.validate()?;
        let executor = WebhookExecutor::new(
            config.webhook_url.trim(),
            config.request_timeout(),
            logger.clone(),
        )
        .with_message_field(config.message_field.trim())
        .with_verbose(config.verbose);
        Ok(Self::new(executor, config.retry_policy(), logger).with_verbose(config.verbose))
    }
}

impl<E: RequestExecutor> ChatClient<E> {
    pub fn new(executor: E, policy: RetryPolicy, logger: Logger) -> Self {
        Self {
            orchestrator: RetryOrchestrator::new(executor, policy, logger.clone()),
            logger,
        }
    }

    pub fn with_events(mut self, events: RetryEventSink) -> Self {
        self.orchestrator = self.orchestrator.with_events(events);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.orchestrator = self.orchestrator.with_verbose(verbose);
        self
    }

    pub fn orchestrator(&self) -> &RetryOrchestrator<E> {
        &self.orchestrator
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub async fn send(&self, message: &str, session_id: &str) -> ChatReply {
        let outcome = self.orchestrator.send(message, session_id).await;
        let display = outcome
            .payload()
            .map(|payload| format_response_logged(payload, &self.logger));
        ChatReply { outcome, display }
    }
}
