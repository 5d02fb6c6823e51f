use crate::errors::{ErrorEnvelope, ErrorKind};
use crate::events::{RetryEvent, RetryEventSink};
use crate::executor::{RequestExecutor, validate_input};
use crate::types::{Diagnostics, OutcomeEnvelope, WebhookPayload};
use futures::FutureExt;
use hookchat_log::{CorrelationContext, LogRecord, Logger, Severity};
use serde_json::json;
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

const LOG_SOURCE: &str = "retry";

pub fn default_retryable_kinds() -> BTreeSet<ErrorKind> {
    [ErrorKind::Network, ErrorKind::Server, ErrorKind::Timeout]
        .into_iter()
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retryable_kinds: BTreeSet<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            retryable_kinds: default_retryable_kinds(),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable_kinds.contains(&kind)
    }

    /// Linear backoff: the wait after the attempt at `attempt_index`
    /// (zero-based) is `retry_delay * (attempt_index + 1)`.
    pub fn delay_before_retry(&self, attempt_index: u32) -> Duration {
        self.retry_delay
            .saturating_mul(attempt_index.saturating_add(1))
    }
}

/// Re-runs an executor on transient failures with linearly growing waits.
#[derive(Clone, Debug)]
pub struct RetryOrchestrator<E> {
    executor: E,
    policy: RetryPolicy,
    logger: Logger,
    events: RetryEventSink,
    verbose: bool,
}

impl<E: RequestExecutor> RetryOrchestrator<E> {
    pub fn new(executor: E, policy: RetryPolicy, logger: Logger) -> Self {
        Self {
            executor,
            policy,
            logger,
            events: RetryEventSink::default(),
            verbose: false,
        }
    }

    pub fn with_events(mut self, events: RetryEventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub async fn send(&self, message: &str, session_id: &str) -> OutcomeEnvelope {
        let started = Instant::now();
        let context = CorrelationContext::session(session_id);

        if let Err(error) = validate_input(message, session_id) {
            let record = LogRecord::new(
                Severity::Warning,
                LOG_SOURCE,
                "rejected message before sending",
            )
            .with_kind(error.kind.as_str())
            .with_context(context);
            let trail = self.verbose.then(|| Diagnostics {
                logs: vec![record.summary()],
                ..Diagnostics::default()
            });
            self.logger.record(record);
            return self.finish(Err(error), trail, 0, started);
        }

        let max_attempts = self.policy.max_attempts();
        let mut trail = self.verbose.then(Diagnostics::default);
        let mut last_error = None;
        let mut attempts = 0;

        for index in 0..max_attempts {
            let attempt = index + 1;
            attempts = attempt;
            self.events.emit(RetryEvent::AttemptStarted {
                attempt,
                max_attempts,
            });

            let outcome = self.run_attempt(message, session_id).await;
            if let (Some(trail), Some(diagnostics)) = (trail.as_mut(), outcome.diagnostics) {
                trail.absorb(diagnostics);
            }

            let error = match reject_empty(outcome.result) {
                Ok(payload) => {
                    self.events.emit(RetryEvent::Succeeded { attempt });
                    return self.finish(Ok(payload), trail, attempts, started);
                }
                Err(error) => error,
            };

            if !self.policy.is_retryable(error.kind) {
                self.log(
                    Severity::Warning,
                    format!("giving up after attempt {attempt}: {} is not retried", error.kind),
                    &context,
                    trail.as_mut(),
                );
                self.events.emit(RetryEvent::GaveUp {
                    attempt,
                    error_kind: error.kind,
                    message: error.message.clone(),
                });
                return self.finish(Err(error), trail, attempts, started);
            }

            if attempt < max_attempts {
                let delay = self.policy.delay_before_retry(index);
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                self.log(
                    Severity::Warning,
                    format!(
                        "attempt {attempt}/{max_attempts} failed with {}, retrying in {delay_ms} ms",
                        error.kind
                    ),
                    &context,
                    trail.as_mut(),
                );
                self.events.emit(RetryEvent::Retrying {
                    attempt,
                    next_attempt: attempt + 1,
                    delay_ms,
                    error_kind: error.kind,
                    notice: error.kind.retrying_message().to_string(),
                });
                tokio::time::sleep(delay).await;
            }
            last_error = Some(error);
        }

        let error = last_error
            .unwrap_or_else(|| ErrorEnvelope::unreachable("no attempt produced an outcome"));
        self.log(
            Severity::Error,
            format!("all {attempts} attempts failed, last error {}", error.kind),
            &context,
            trail.as_mut(),
        );
        self.events.emit(RetryEvent::Exhausted {
            attempts,
            error_kind: error.kind,
            message: error.message.clone(),
        });
        self.finish(Err(error), trail, attempts, started)
    }

    async fn run_attempt(&self, message: &str, session_id: &str) -> OutcomeEnvelope {
        match AssertUnwindSafe(self.executor.execute(message, session_id))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                self.logger.record(
                    LogRecord::new(
                        Severity::Critical,
                        LOG_SOURCE,
                        "attempt ended without an outcome",
                    )
                    .with_kind(ErrorKind::Unknown.as_str())
                    .with_stack(reason.clone())
                    .with_context(CorrelationContext::session(session_id)),
                );
                OutcomeEnvelope::failure(ErrorEnvelope::unreachable(format!(
                    "executor panicked: {reason}"
                )))
            }
        }
    }

    fn log(
        &self,
        level: Severity,
        message: String,
        context: &CorrelationContext,
        trail: Option<&mut Diagnostics>,
    ) {
        let record = LogRecord::new(level, LOG_SOURCE, message).with_context(context.clone());
        if let Some(trail) = trail {
            trail.logs.push(record.summary());
        }
        self.logger.record(record);
    }

    fn finish(
        &self,
        result: Result<WebhookPayload, ErrorEnvelope>,
        trail: Option<Diagnostics>,
        attempts: u32,
        started: Instant,
    ) -> OutcomeEnvelope {
        let diagnostics = trail.map(|mut trail| {
            trail.attempts = attempts;
            trail.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            trail
        });
        OutcomeEnvelope {
            result,
            diagnostics,
        }
    }
}

/// A success without content counts as an unknown failure.
fn reject_empty(
    result: Result<WebhookPayload, ErrorEnvelope>,
) -> Result<WebhookPayload, ErrorEnvelope> {
    match result {
        Ok(payload) if payload.is_empty() => Err(ErrorEnvelope::new(ErrorKind::Unknown)
            .with_developer_message("webhook reported success with an empty payload")
            .with_details(json!({ "body": payload.body }))),
        other => other,
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        return (*text).to_string();
    }
    if let Some(text) = panic.downcast_ref::<String>() {
        return text.clone();
    }
    "non-string panic payload".to_string()
}
