//! Resend-style `POST /emails` payloads.

use super::normalize_recipients;
use crate::error::{PitError, Result};
use crate::types::{non_empty, Attachment, CapturedEmail, Provider, Tag};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Incoming request body as sent by the Resend SDK.
///
/// Address fields stay loosely typed so a string and a list are both
/// accepted.
#[derive(Debug, Default, Deserialize)]
pub struct ResendEmailRequest {
    #[serde(default)]
    pub from: Value,
    #[serde(default)]
    pub to: Value,
    #[serde(default)]
    pub subject: Value,
    #[serde(default)]
    pub cc: Value,
    #[serde(default)]
    pub bcc: Value,
    #[serde(default)]
    pub reply_to: Value,
    pub html: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub tags: Option<Vec<Tag>>,
    #[serde(default)]
    pub attachments: Option<Vec<AttachmentRequest>>,
}

/// Attachment as submitted; only the filename and content length are kept.
#[derive(Debug, Deserialize)]
pub struct AttachmentRequest {
    #[serde(default)]
    pub filename: String,
    pub content: Option<String>,
}

impl ResendEmailRequest {
    /// Validate required fields and build the stored email.
    pub fn into_email(self) -> Result<CapturedEmail> {
        let from = required_str(&self.from, "from")?;

        let to = normalize_recipients(&self.to);
        if to.is_empty() {
            return Err(missing("to"));
        }

        let subject = required_str(&self.subject, "subject")?;

        let mut email = CapturedEmail::new(Provider::Resend, from, to, subject);
        email.cc = normalize_recipients(&self.cc);
        email.bcc = normalize_recipients(&self.bcc);
        email.html = self.html.and_then(non_empty);
        email.text = self.text.and_then(non_empty);
        email.reply_to = normalize_recipients(&self.reply_to).into_iter().next();
        email.headers = self.headers.unwrap_or_default();
        email.tags = self.tags.unwrap_or_default();
        email.attachments = self
            .attachments
            .unwrap_or_default()
            .into_iter()
            .map(|a| Attachment::from_base64(a.filename, a.content.as_deref()))
            .collect();

        Ok(email)
    }
}

/// Parse and validate a raw `POST /emails` body.
pub fn parse_resend_request(body: &[u8]) -> Result<CapturedEmail> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| PitError::validation("Invalid JSON in request body."))?;

    if !value.is_object() {
        return Err(PitError::validation(
            "Request body must be a valid JSON object.",
        ));
    }

    let request: ResendEmailRequest = serde_json::from_value(value)
        .map_err(|e| PitError::validation(format!("Invalid request body: {}", e)))?;

    request.into_email()
}

fn required_str(value: &Value, field: &str) -> Result<String> {
    match value.as_str() {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(missing(field)),
    }
}

fn missing(field: &str) -> PitError {
    PitError::validation(format!("The `{}` field is required.", field))
}
