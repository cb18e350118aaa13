//! Consuming side of the `/events` stream.
//!
//! [`EventStreamDecoder`] turns raw Server-Sent Events bytes into
//! [`MailEvent`]s. Keepalive comments are skipped, and a malformed message
//! is logged and dropped without ending the stream. [`MailboxMirror`]
//! applies decoded events to a local copy of the mailbox the way a viewer
//! does.

use crate::error::Result;
use crate::store::DEFAULT_CAPACITY;
use crate::subscriptions::MailEvent;
use crate::types::CapturedEmail;
use std::sync::Arc;
use tracing::warn;

/// Incremental SSE decoder.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    malformed: usize,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<MailEvent> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_frame_end(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let frame = String::from_utf8_lossy(&frame[..end]);

            match parse_frame(&frame) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    self.malformed += 1;
                    warn!(error = %e, "Dropping malformed stream message");
                }
            }
        }
        events
    }

    /// Number of messages dropped as malformed so far.
    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Parse one SSE frame (without its terminating blank line).
///
/// Returns `Ok(None)` for frames with no data, such as keepalive comments.
pub fn parse_frame(frame: &str) -> Result<Option<MailEvent>> {
    let mut data: Vec<&str> = Vec::new();

    for line in frame.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if data.is_empty() {
        return Ok(None);
    }

    let event = serde_json::from_str(&data.join("\n"))?;
    Ok(Some(event))
}

/// Client-side replica of the mailbox.
#[derive(Debug)]
pub struct MailboxMirror {
    capacity: usize,
    emails: Vec<Arc<CapturedEmail>>,
    initialized: bool,
}

impl MailboxMirror {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            emails: Vec::new(),
            initialized: false,
        }
    }

    /// Apply one event.
    pub fn apply(&mut self, event: MailEvent) {
        match event {
            MailEvent::Init { mut emails } => {
                emails.truncate(self.capacity);
                self.emails = emails;
                self.initialized = true;
            }
            MailEvent::Added { email } => {
                self.emails.insert(0, email);
                self.emails.truncate(self.capacity);
            }
            MailEvent::Cleared => self.emails.clear(),
            MailEvent::Dropped { .. } => {}
        }
    }

    /// Emails newest first.
    pub fn emails(&self) -> &[Arc<CapturedEmail>] {
        &self.emails
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    /// Whether an `init` snapshot has been applied.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl Default for MailboxMirror {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PitError;
    use crate::types::Provider;

    fn email(subject: &str) -> Arc<CapturedEmail> {
        Arc::new(CapturedEmail::new(
            Provider::Resend,
            "a@x.io",
            vec!["b@x.io".to_string()],
            subject,
        ))
    }

    fn frame(event: &MailEvent) -> String {
        format!("data: {}\n\n", serde_json::to_string(event).unwrap())
    }

    #[test]
    fn test_decodes_frames_and_skips_keepalive() {
        let mut decoder = EventStreamDecoder::new();
        let input = format!(
            "{}:keepalive\n\n{}",
            frame(&MailEvent::Init { emails: vec![] }),
            frame(&MailEvent::Cleared)
        );

        let events = decoder.push(input.as_bytes());
        assert_eq!(events, vec![MailEvent::Init { emails: vec![] }, MailEvent::Cleared]);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = EventStreamDecoder::new();
        let input = frame(&MailEvent::Added { email: email("split") }).replace('\n', "\r\n");
        let (head, tail) = input.as_bytes().split_at(10);

        assert!(decoder.push(head).is_empty());
        let events = decoder.push(tail);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], MailEvent::Added { email } if email.subject == "split"));
    }

    #[test]
    fn test_malformed_message_is_dropped() {
        let mut decoder = EventStreamDecoder::new();
        let input = format!("data: {{broken\n\n{}", frame(&MailEvent::Cleared));

        let events = decoder.push(input.as_bytes());
        assert_eq!(events, vec![MailEvent::Cleared]);
        assert_eq!(decoder.malformed(), 1);
    }

    #[test]
    fn test_parse_frame_errors() {
        assert!(matches!(parse_frame("data: nope"), Err(PitError::Parse(_))));
        assert!(matches!(parse_frame(r#"data: {"type":"bogus"}"#), Err(PitError::Parse(_))));
        assert!(parse_frame(": keepalive").unwrap().is_none());
    }

    #[test]
    fn test_mirror_applies_events() {
        let mut mirror = MailboxMirror::new(2);
        assert!(!mirror.is_initialized());

        mirror.apply(MailEvent::Init { emails: vec![email("A")] });
        mirror.apply(MailEvent::Added { email: email("B") });
        mirror.apply(MailEvent::Added { email: email("C") });

        let subjects: Vec<_> = mirror.emails().iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["C", "B"]);
        assert!(mirror.is_initialized());

        mirror.apply(MailEvent::Cleared);
        assert!(mirror.is_empty());
    }
}
