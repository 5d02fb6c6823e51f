//! Single webhook call: validation, one POST under a hard timeout, tolerant
//! body parsing, and classification of every failure into an [`ErrorEnvelope`].

use crate::errors::{ErrorEnvelope, ErrorKind};
use crate::types::{Diagnostics, OutcomeEnvelope, WebhookPayload};
use async_trait::async_trait;
use hookchat_log::{CorrelationContext, LogRecord, Logger, Severity};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_MESSAGE_FIELD: &str = "message";
pub const DEFAULT_REQUEST_TIMEOUT: Duration =
    Duration::from_millis(crate::config::DEFAULT_REQUEST_TIMEOUT_MS);
pub const SESSION_ID_FIELD: &str = "sessionId";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const LOG_SOURCE: &str = "webhook";
const BODY_EXCERPT_LIMIT: usize = 512;

/// Performs one attempt. Implementations return failures inside the
/// envelope and never panic for expected failure modes.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, message: &str, session_id: &str) -> OutcomeEnvelope;
}

#[async_trait]
impl<T> RequestExecutor for std::sync::Arc<T>
where
    T: RequestExecutor + ?Sized,
{
    async fn execute(&self, message: &str, session_id: &str) -> OutcomeEnvelope {
        (**self).execute(message, session_id).await
    }
}

pub fn validate_input(message: &str, session_id: &str) -> Result<(), ErrorEnvelope> {
    if message.trim().is_empty() {
        return Err(ErrorEnvelope::validation("message is empty after trimming"));
    }
    if session_id.is_empty() {
        return Err(ErrorEnvelope::validation("session id is empty"));
    }
    Ok(())
}

/// Body parsing that never fails: blank bodies become a synthetic
/// placeholder and non-JSON text is wrapped as `{"text": ...}`.
pub fn parse_body(raw: &str) -> WebhookPayload {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return WebhookPayload::placeholder();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(body) => WebhookPayload::json(body),
        Err(_) => WebhookPayload::raw_text(trimmed),
    }
}

#[derive(Clone, Debug)]
pub struct WebhookExecutor {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    message_field: String,
    verbose: bool,
    logger: Logger,
}

impl WebhookExecutor {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, logger: Logger) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout,
            message_field: DEFAULT_MESSAGE_FIELD.to_string(),
            verbose: false,
            logger,
        }
    }

    pub fn with_message_field(mut self, field: impl Into<String>) -> Self {
        self.message_field = field.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn request_body(&self, message: &str, session_id: &str) -> Value {
        let mut body = Map::new();
        body.insert(self.message_field.clone(), Value::String(message.to_string()));
        body.insert(SESSION_ID_FIELD.to_string(), Value::String(session_id.to_string()));
        Value::Object(body)
    }

    async fn exchange(
        &self,
        body: &Value,
        request_id: &str,
        trace: &mut AttemptTrace<'_>,
    ) -> Result<WebhookPayload, AttemptError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(REQUEST_ID_HEADER, request_id)
            .json(body)
            .send()
            .await
            .map_err(AttemptError::Transport)?;

        let status = response.status();
        trace.emit(
            LogRecord::new(
                Severity::Info,
                LOG_SOURCE,
                format!("webhook responded with status {status}"),
            )
            .with_kind("response_status")
            .with_details(json!({ "status": status.as_u16() })),
        );

        if let Some(kind) = ErrorKind::from_status(status.as_u16()) {
            // The status alone decides the class; an unreadable body only loses the excerpt.
            let text = response.text().await.unwrap_or_default();
            return Err(AttemptError::Classified(status_error(kind, status, &text)));
        }
        let text = response.text().await.map_err(AttemptError::Transport)?;
        Ok(parse_body(&text))
    }
}

#[async_trait]
impl RequestExecutor for WebhookExecutor {
    async fn execute(&self, message: &str, session_id: &str) -> OutcomeEnvelope {
        let started = Instant::now();
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut trace = AttemptTrace::new(&self.logger, session_id, &request_id, self.verbose);

        if let Err(error) = validate_input(message, session_id) {
            trace.failure(&error);
            let diagnostics = trace.finish(None, &request_id, started);
            return OutcomeEnvelope::failure(error).with_diagnostics(diagnostics);
        }

        let body = self.request_body(message, session_id);
        trace.emit(
            LogRecord::new(Severity::Info, LOG_SOURCE, "sending message to webhook")
                .with_kind("request_start")
                .with_details(json!({
                    "endpoint": self.endpoint,
                    "timeout_ms": duration_ms(self.timeout),
                    "message_length": message.chars().count(),
                })),
        );

        let exchanged =
            tokio::time::timeout(self.timeout, self.exchange(&body, &request_id, &mut trace)).await;
        let result = match exchanged {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(error)) => Err(error.classify(self.timeout)),
            Err(_) => Err(timeout_error(self.timeout)),
        };

        if let Err(error) = &result {
            trace.failure(error);
        }
        let diagnostics = trace.finish(Some(body), &request_id, started);
        OutcomeEnvelope {
            result,
            diagnostics,
        }
    }
}

enum AttemptError {
    /// Already classified by an inner layer; preserved as is.
    Classified(ErrorEnvelope),
    Transport(reqwest::Error),
}

impl AttemptError {
    fn classify(self, timeout: Duration) -> ErrorEnvelope {
        match self {
            Self::Classified(envelope) => envelope,
            Self::Transport(error) if error.is_timeout() => timeout_error(timeout),
            Self::Transport(error) => ErrorEnvelope::new(ErrorKind::Network)
                .with_developer_message(format!("transport failure: {error}"))
                .with_details(json!({
                    "connect": error.is_connect(),
                    "request": error.is_request(),
                    "body": error.is_body(),
                    "decode": error.is_decode(),
                })),
        }
    }
}

fn timeout_error(timeout: Duration) -> ErrorEnvelope {
    ErrorEnvelope::new(ErrorKind::Timeout)
        .with_developer_message(format!(
            "webhook call aborted after {} ms",
            duration_ms(timeout)
        ))
        .with_details(json!({ "timeout_ms": duration_ms(timeout) }))
}

fn status_error(kind: ErrorKind, status: reqwest::StatusCode, body: &str) -> ErrorEnvelope {
    let mut details = Map::new();
    details.insert("status".to_string(), json!(status.as_u16()));
    let excerpt = body_excerpt(body);
    if !excerpt.is_empty() {
        details.insert("body".to_string(), Value::String(excerpt));
    }
    ErrorEnvelope::new(kind)
        .with_status(status.as_u16())
        .with_developer_message(format!("webhook returned HTTP {status}"))
        .with_details(Value::Object(details))
}

fn body_excerpt(body: &str) -> String {
    body.trim().chars().take(BODY_EXCERPT_LIMIT).collect()
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn failure_severity(kind: ErrorKind) -> Severity {
    match kind {
        ErrorKind::Validation | ErrorKind::Auth | ErrorKind::RateLimit => Severity::Warning,
        ErrorKind::Network | ErrorKind::Server | ErrorKind::Timeout | ErrorKind::Unknown => {
            Severity::Error
        }
    }
}

/// Logs one attempt and, in verbose mode, keeps its lines for diagnostics.
struct AttemptTrace<'a> {
    logger: &'a Logger,
    context: CorrelationContext,
    lines: Option<Vec<String>>,
}

impl<'a> AttemptTrace<'a> {
    fn new(logger: &'a Logger, session_id: &str, request_id: &str, verbose: bool) -> Self {
        Self {
            logger,
            context: CorrelationContext::new(session_id, request_id),
            lines: verbose.then(Vec::new),
        }
    }

    fn emit(&mut self, record: LogRecord) {
        let record = record.with_context(self.context.clone());
        if let Some(lines) = self.lines.as_mut() {
            lines.push(record.summary());
        }
        self.logger.record(record);
    }

    fn failure(&mut self, error: &ErrorEnvelope) {
        let message = error
            .developer_message
            .clone()
            .unwrap_or_else(|| error.message.clone());
        let mut record = LogRecord::new(failure_severity(error.kind), LOG_SOURCE, message)
            .with_kind(error.kind.as_str());
        if let Ok(details) = serde_json::to_value(error) {
            record = record.with_details(details);
        }
        self.emit(record);
    }

    fn finish(
        self,
        request: Option<Value>,
        request_id: &str,
        started: Instant,
    ) -> Option<Diagnostics> {
        self.lines.map(|logs| Diagnostics {
            request,
            request_id: Some(request_id.to_string()),
            logs,
            elapsed_ms: duration_ms(started.elapsed()),
            attempts: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_input_rejects_blank_message_and_empty_session() {
        let blank = validate_input("  \n\t", "sess-1").expect_err("blank message should fail");
        assert_eq!(blank.kind, ErrorKind::Validation);

        let no_session = validate_input("hello", "").expect_err("empty session should fail");
        assert_eq!(no_session.kind, ErrorKind::Validation);

        assert!(validate_input(" hello ", "sess-1").is_ok());
    }

    #[test]
    fn parse_body_blank_expected_synthetic_placeholder() {
        let payload = parse_body("   \n");
        assert!(payload.synthetic);
        assert_eq!(
            payload.body["text"],
            crate::types::EMPTY_REPLY_PLACEHOLDER
        );
    }

    #[test]
    fn parse_body_json_and_plain_text() {
        let payload = parse_body(r#"{"message":"hi","image":"a.png"}"#);
        assert!(!payload.synthetic);
        assert_eq!(payload.body["message"], "hi");

        let text = parse_body("  plain words\n");
        assert_eq!(text.body, json!({"text": "plain words"}));
        assert!(!text.synthetic);
    }

    #[test]
    fn request_body_uses_configured_message_field() {
        let executor = WebhookExecutor::new(
            "http://127.0.0.1:9/hook",
            DEFAULT_REQUEST_TIMEOUT,
            Logger::disabled(),
        )
        .with_message_field("prompt");
        assert_eq!(
            executor.request_body("hi", "sess-1"),
            json!({"prompt": "hi", "sessionId": "sess-1"})
        );
    }

    #[test]
    fn status_error_keeps_status_and_body_excerpt() {
        let long_body = "e".repeat(BODY_EXCERPT_LIMIT + 10);
        let error = status_error(
            ErrorKind::Server,
            reqwest::StatusCode::BAD_GATEWAY,
            &long_body,
        );
        assert_eq!(error.status, Some(502));
        assert_eq!(error.message, ErrorKind::Server.user_message());
        let details = error.details.expect("details should be present");
        assert_eq!(
            details["body"].as_str().map(str::len),
            Some(BODY_EXCERPT_LIMIT)
        );
    }

    #[test]
    fn classified_error_is_preserved_by_classify() {
        let inner = ErrorEnvelope::new(ErrorKind::Server).with_status(503);
        let classified =
            AttemptError::Classified(inner.clone()).classify(DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(classified, inner);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn execute_error_status_with_truncated_body_expected_status_class_kept() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind should succeed");
        let addr = listener.local_addr().expect("addr should resolve");
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept should succeed");
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.ends_with(b"}") {
                let read = socket.read(&mut chunk).await.expect("read should succeed");
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..read]);
            }
            socket
                .write_all(
                    b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 100\r\n\r\npartial",
                )
                .await
                .expect("write should succeed");
            socket.shutdown().await.expect("shutdown should succeed");
        });

        let executor = WebhookExecutor::new(
            format!("http://{addr}/hook"),
            Duration::from_secs(5),
            Logger::disabled(),
        );
        let outcome = executor.execute("hello", "sess-1").await;
        server.await.expect("server task should finish");

        let error = outcome.error().expect("503 should fail");
        assert_eq!(error.kind, ErrorKind::Server);
        assert_eq!(error.status, Some(503));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn execute_connection_refused_expected_network_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("addr should resolve");
        drop(listener);

        let executor = WebhookExecutor::new(
            format!("http://{addr}/hook"),
            Duration::from_secs(5),
            Logger::disabled(),
        );
        let outcome = executor.execute("hello", "sess-1").await;
        let error = outcome.error().expect("refused connection should fail");
        assert_eq!(error.kind, ErrorKind::Network);
        assert!(error.developer_message.is_some());
    }
}
