//! Ingestion boundary: provider-shaped requests to [`CapturedEmail`]s.
//!
//! Each submodule accepts one provider's wire format, validates it, and
//! produces a normalized email with a fresh id and a server timestamp.
//! Validation failures come back as [`PitError::Validation`] and never touch
//! the store.
//!
//! [`CapturedEmail`]: crate::types::CapturedEmail
//! [`PitError::Validation`]: crate::error::PitError::Validation

pub mod mime;
pub mod resend;
pub mod ses;

pub use mime::{parse_message, parse_raw_message, MimeContent};
pub use resend::{parse_resend_request, AttachmentRequest, ResendEmailRequest};
pub use ses::{parse_ses_v1, parse_ses_v2, SesAction, SesV1Submission, SesV2Request};

use serde_json::Value;

/// Accept a single address or a list of addresses.
///
/// Empty strings and non-string list entries are skipped.
pub fn normalize_recipients(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_recipients() {
        assert_eq!(normalize_recipients(&json!("a@x.io")), vec!["a@x.io"]);
        assert_eq!(
            normalize_recipients(&json!(["a@x.io", 7, "b@x.io", ""])),
            vec!["a@x.io", "b@x.io"]
        );
        assert!(normalize_recipients(&json!("")).is_empty());
        assert!(normalize_recipients(&Value::Null).is_empty());
        assert!(normalize_recipients(&json!({"to": "a@x.io"})).is_empty());
    }
}
