//! Amazon SES submissions: the v2 JSON API and the v1 form-encoded query API.

use super::mime::{parse_raw_message, MimeContent};
use crate::error::{PitError, Result};
use crate::types::{non_empty, CapturedEmail, Provider, Tag};
use serde::Deserialize;
use std::collections::HashMap;

/// Error label for SES v2 JSON errors.
pub const SES_V2_ERROR_KIND: &str = "ValidationException";

// --- SES v2 ---

/// `SendEmail` request body of the SES v2 API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SesV2Request {
    pub from_email_address: String,
    pub destination: SesDestination,
    pub reply_to_addresses: Vec<String>,
    pub content: SesContent,
    pub email_tags: Vec<SesEmailTag>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SesDestination {
    pub to_addresses: Vec<String>,
    pub cc_addresses: Vec<String>,
    pub bcc_addresses: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SesContent {
    pub simple: Option<SesSimpleContent>,
    pub raw: Option<SesDataField>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SesSimpleContent {
    pub subject: SesDataField,
    pub body: SesBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SesBody {
    pub html: Option<SesDataField>,
    pub text: Option<SesDataField>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SesDataField {
    pub data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SesEmailTag {
    pub name: String,
    pub value: String,
}

impl SesV2Request {
    /// Validate and build the stored email.
    pub fn into_email(self) -> Result<CapturedEmail> {
        if self.from_email_address.is_empty() {
            return Err(v2_error("FromEmailAddress is required"));
        }
        if self.destination.to_addresses.is_empty() {
            return Err(v2_error("Destination.ToAddresses is required"));
        }

        let content = match (self.content.simple, self.content.raw) {
            (Some(simple), _) => MimeContent {
                subject: simple.subject.data,
                html: simple.body.html.map(|f| f.data).unwrap_or_default(),
                text: simple.body.text.map(|f| f.data).unwrap_or_default(),
            },
            (None, Some(raw)) => parse_raw_message(&raw.data),
            (None, None) => return Err(v2_error("Content.Simple or Content.Raw is required")),
        };

        let mut email = CapturedEmail::new(
            Provider::Ses,
            self.from_email_address,
            self.destination.to_addresses,
            content.subject,
        )
        .with_html(content.html)
        .with_text(content.text);
        email.cc = self.destination.cc_addresses;
        email.bcc = self.destination.bcc_addresses;
        email.reply_to = self.reply_to_addresses.into_iter().next();
        email.tags = self
            .email_tags
            .into_iter()
            .map(|t| Tag {
                name: t.name,
                value: t.value,
            })
            .collect();

        Ok(email)
    }
}

/// Parse and validate a raw SES v2 `SendEmail` body.
pub fn parse_ses_v2(body: &[u8]) -> Result<CapturedEmail> {
    let request: SesV2Request =
        serde_json::from_slice(body).map_err(|_| v2_error("Invalid JSON in request body"))?;
    request.into_email()
}

fn v2_error(message: &str) -> PitError {
    PitError::validation_with(400, SES_V2_ERROR_KIND, message)
}

// --- SES v1 ---

/// Actions of the SES v1 query API that capture mail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SesAction {
    SendEmail,
    SendRawEmail,
}

impl SesAction {
    /// Name of the action, e.g. `SendEmail`.
    pub fn name(self) -> &'static str {
        match self {
            SesAction::SendEmail => "SendEmail",
            SesAction::SendRawEmail => "SendRawEmail",
        }
    }
}

/// A successfully parsed v1 submission.
#[derive(Debug)]
pub struct SesV1Submission {
    pub action: SesAction,
    pub email: CapturedEmail,
}

/// Parse an SES v1 form-encoded request.
///
/// Errors carry the SES error code as their kind.
pub fn parse_ses_v1(form: &HashMap<String, String>) -> Result<SesV1Submission> {
    let action = form.get("Action").map(String::as_str).unwrap_or_default();
    match action {
        "SendEmail" => parse_send_email(form).map(|email| SesV1Submission {
            action: SesAction::SendEmail,
            email,
        }),
        "SendRawEmail" => parse_send_raw_email(form).map(|email| SesV1Submission {
            action: SesAction::SendRawEmail,
            email,
        }),
        other => Err(PitError::validation_with(
            400,
            "InvalidAction",
            format!("Unknown action: {}", other),
        )),
    }
}

fn parse_send_email(form: &HashMap<String, String>) -> Result<CapturedEmail> {
    let from = form_value(form, "Source");
    if from.is_empty() {
        return Err(v1_error("Source is required"));
    }

    let to = indexed_values(form, "Destination.ToAddresses.member.");
    if to.is_empty() {
        return Err(v1_error("Destination.ToAddresses is required"));
    }

    let mut email = CapturedEmail::new(
        Provider::Ses,
        from,
        to,
        form_value(form, "Message.Subject.Data"),
    )
    .with_html(form_value(form, "Message.Body.Html.Data"))
    .with_text(form_value(form, "Message.Body.Text.Data"));
    email.cc = indexed_values(form, "Destination.CcAddresses.member.");
    email.bcc = indexed_values(form, "Destination.BccAddresses.member.");
    email.reply_to = non_empty(form_value(form, "ReplyToAddresses.member.1"));

    Ok(email)
}

fn parse_send_raw_email(form: &HashMap<String, String>) -> Result<CapturedEmail> {
    let raw = form_value(form, "RawMessage.Data");
    if raw.is_empty() {
        return Err(v1_error("RawMessage.Data is required"));
    }

    let content = parse_raw_message(&raw);
    Ok(CapturedEmail::new(
        Provider::Ses,
        form_value(form, "Source"),
        indexed_values(form, "Destinations.member."),
        content.subject,
    )
    .with_html(content.html)
    .with_text(content.text))
}

fn form_value(form: &HashMap<String, String>, key: &str) -> String {
    form.get(key).cloned().unwrap_or_default()
}

/// Values of `prefix1`, `prefix2`, ... up to the first missing or empty one.
fn indexed_values(form: &HashMap<String, String>, prefix: &str) -> Vec<String> {
    (1..)
        .map(|i| form.get(&format!("{}{}", prefix, i)))
        .take_while(|v| v.is_some_and(|v| !v.is_empty()))
        .flatten()
        .cloned()
        .collect()
}

fn v1_error(message: &str) -> PitError {
    PitError::validation_with(400, "ValidationError", message)
}
