//! Core types for captured mail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a captured email.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailId(pub Uuid);

impl EmailId {
    /// Fresh random identifier.
    pub fn new() -> Self {
        EmailId(Uuid::new_v4())
    }
}

impl Default for EmailId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EmailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EmailId({})", self.0)
    }
}

impl fmt::Display for EmailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which provider API the email was submitted through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Resend,
    Ses,
}

/// Metadata tag attached to an email.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

/// Attachment summary. Content is never retained, only its estimated size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

impl Attachment {
    /// Build a summary from base64 content, estimating the decoded size.
    pub fn from_base64(filename: impl Into<String>, content: Option<&str>) -> Self {
        let size = content
            .filter(|c| !c.is_empty())
            .map(|c| c.len() * 3 / 4);
        Self {
            filename: filename.into(),
            size,
        }
    }
}

/// A single captured email. Immutable once handed to the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedEmail {
    /// Unique identifier (assigned at ingestion).
    pub id: EmailId,

    #[serde(default)]
    pub provider: Provider,

    pub from: String,

    #[serde(default)]
    pub to: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,

    pub subject: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    /// Server-assigned receive time.
    pub created_at: DateTime<Utc>,
}

impl CapturedEmail {
    /// Start a new email with a fresh id and the current time.
    pub fn new(
        provider: Provider,
        from: impl Into<String>,
        to: Vec<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            id: EmailId::new(),
            provider,
            from: from.into(),
            to,
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            html: None,
            text: None,
            reply_to: None,
            headers: BTreeMap::new(),
            tags: Vec::new(),
            attachments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = non_empty(html.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = non_empty(text.into());
        self
    }
}

/// `Some(s)` unless `s` is empty.
pub(crate) fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
