//! Turns a loosely shaped webhook body into something a host can display.
//!
//! A field counts as present only when it is a string with non-whitespace
//! content; blank `text` falls through to `message`, then to the fallback.

use crate::types::WebhookPayload;
use hookchat_log::{LogRecord, Logger, Severity};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const FALLBACK_REPLY_TEXT: &str = "No response received.";

const TEXT_FIELDS: [&str; 2] = ["text", "message"];
const IMAGE_FIELDS: [&str; 3] = ["image", "imageUrl", "url"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

pub fn format_response(payload: &WebhookPayload) -> DisplayPayload {
    format_value(&payload.body)
}

pub fn format_value(body: &Value) -> DisplayPayload {
    if let Some(text) = non_empty_str(body) {
        return DisplayPayload {
            text: text.to_string(),
            image: None,
        };
    }

    let text = first_string(body, &TEXT_FIELDS)
        .map(|(_, text)| text.to_string())
        .unwrap_or_else(|| FALLBACK_REPLY_TEXT.to_string());
    let image = first_string(body, &IMAGE_FIELDS).map(|(_, image)| image.to_string());
    DisplayPayload { text, image }
}

/// Same as [`format_response`], plus one Info record describing which
/// fields were used.
pub fn format_response_logged(payload: &WebhookPayload, logger: &Logger) -> DisplayPayload {
    let display = format_response(payload);
    let text_field = first_string(&payload.body, &TEXT_FIELDS).map(|(field, _)| field);
    let image_field = first_string(&payload.body, &IMAGE_FIELDS).map(|(field, _)| field);
    logger.record(
        LogRecord::new(Severity::Info, "format", "formatted webhook response")
            .with_kind("format")
            .with_details(json!({
                "text_field": text_field,
                "image_field": image_field,
                "fallback_text": text_field.is_none() && non_empty_str(&payload.body).is_none(),
                "synthetic": payload.synthetic,
            })),
    );
    display
}

fn first_string<'a>(
    body: &'a Value,
    fields: &[&'static str],
) -> Option<(&'static str, &'a str)> {
    let object = body.as_object()?;
    fields.iter().find_map(|field| {
        object
            .get(*field)
            .and_then(non_empty_str)
            .map(|value| (*field, value))
    })
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|text| !text.trim().is_empty())
}
