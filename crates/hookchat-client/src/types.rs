use crate::errors::ErrorEnvelope;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Display text used when the webhook answers with an empty body.
pub const EMPTY_REPLY_PLACEHOLDER: &str = "The assistant replied without any content.";

/// Parsed webhook response body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub body: Value,
    /// Set when the body was fabricated locally rather than received.
    #[serde(default)]
    pub synthetic: bool,
}

impl WebhookPayload {
    pub fn json(body: Value) -> Self {
        Self {
            body,
            synthetic: false,
        }
    }

    pub fn raw_text(text: impl Into<String>) -> Self {
        Self::json(json!({ "text": text.into() }))
    }

    pub fn placeholder() -> Self {
        Self {
            body: json!({ "text": EMPTY_REPLY_PLACEHOLDER }),
            synthetic: true,
        }
    }

    /// True for `null`, blank strings, and empty objects or arrays.
    pub fn is_empty(&self) -> bool {
        match &self.body {
            Value::Null => true,
            Value::String(text) => text.trim().is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }
}

/// Verbose trace data attached to an outcome in developer mode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub logs: Vec<String>,
    pub elapsed_ms: u64,
    pub attempts: u32,
}

impl Diagnostics {
    /// Folds one attempt's bundle into an aggregate trail.
    pub fn absorb(&mut self, attempt: Diagnostics) {
        if attempt.request.is_some() {
            self.request = attempt.request;
        }
        if attempt.request_id.is_some() {
            self.request_id = attempt.request_id;
        }
        self.logs.extend(attempt.logs);
    }
}

/// Result of one attempt or of a whole orchestrated send.
#[derive(Clone, Debug, PartialEq)]
pub struct OutcomeEnvelope {
    pub result: Result<WebhookPayload, ErrorEnvelope>,
    pub diagnostics: Option<Diagnostics>,
}

impl OutcomeEnvelope {
    pub fn success(payload: WebhookPayload) -> Self {
        Self {
            result: Ok(payload),
            diagnostics: None,
        }
    }

    pub fn failure(error: ErrorEnvelope) -> Self {
        Self {
            result: Err(error),
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Option<Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn payload(&self) -> Option<&WebhookPayload> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ErrorEnvelope> {
        self.result.as_ref().err()
    }
}

#[derive(Serialize)]
struct OutcomeView<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a WebhookPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ErrorEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a Diagnostics>,
}

impl Serialize for OutcomeEnvelope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        OutcomeView {
            success: self.is_success(),
            payload: self.payload(),
            error: self.error(),
            diagnostics: self.diagnostics.as_ref(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn payload_is_empty_expected_for_null_blank_and_empty_containers() {
        assert!(WebhookPayload::json(Value::Null).is_empty());
        assert!(WebhookPayload::json(json!("  ")).is_empty());
        assert!(WebhookPayload::json(json!({})).is_empty());
        assert!(WebhookPayload::json(json!([])).is_empty());
        assert!(!WebhookPayload::json(json!({"text": "hi"})).is_empty());
        assert!(!WebhookPayload::placeholder().is_empty());
    }

    #[test]
    fn outcome_serializes_exactly_one_of_payload_or_error() {
        let ok = serde_json::to_value(OutcomeEnvelope::success(WebhookPayload::raw_text("hi")))
            .expect("outcome should serialize");
        assert_eq!(ok["success"], true);
        assert_eq!(ok["payload"]["body"]["text"], "hi");
        assert!(ok.get("error").is_none());

        let failed = serde_json::to_value(OutcomeEnvelope::failure(ErrorEnvelope::new(
            ErrorKind::Timeout,
        )))
        .expect("outcome should serialize");
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"]["kind"], "TIMEOUT");
        assert!(failed.get("payload").is_none());
    }

    #[test]
    fn diagnostics_absorb_keeps_latest_request_and_all_logs() {
        let mut total = Diagnostics {
            logs: vec!["a".to_string()],
            ..Diagnostics::default()
        };
        total.absorb(Diagnostics {
            request_id: Some("req-1".to_string()),
            logs: vec!["b".to_string()],
            ..Diagnostics::default()
        });
        total.absorb(Diagnostics {
            request_id: Some("req-2".to_string()),
            logs: vec!["c".to_string()],
            ..Diagnostics::default()
        });
        assert_eq!(total.request_id.as_deref(), Some("req-2"));
        assert_eq!(total.logs, vec!["a", "b", "c"]);
    }
}
