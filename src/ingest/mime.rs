//! Minimal MIME extraction for raw SES submissions.
//!
//! Only pulls out what the viewer shows: the subject, an HTML body and a
//! plain-text body. Nested multiparts are walked; the last matching part of
//! each kind wins.

use base64::prelude::*;
use std::collections::HashMap;

/// Subject and bodies pulled out of a raw message. Empty when absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MimeContent {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Decode a base64 raw message and extract its content.
///
/// Undecodable input yields empty content.
pub fn parse_raw_message(encoded: &str) -> MimeContent {
    let compact: String = encoded.split_whitespace().collect();
    match BASE64_STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => parse_message(&String::from_utf8_lossy(&bytes)),
        Err(_) => MimeContent::default(),
    }
}

/// Extract content from an RFC 5322 message.
pub fn parse_message(message: &str) -> MimeContent {
    let message = message.replace("\r\n", "\n");
    let Some((headers, body)) = split_entity(&message) else {
        return MimeContent::default();
    };

    let mut content = MimeContent {
        subject: headers.get("subject").cloned().unwrap_or_default(),
        ..Default::default()
    };

    let body = decode_transfer(body, headers.get("content-transfer-encoding"));
    match headers.get("content-type").and_then(|ct| parse_media_type(ct)) {
        Some((media, params)) if media.starts_with("multipart/") => {
            let (html, text) = parse_parts(&body, params.get("boundary").map(String::as_str));
            content.html = html;
            content.text = text;
        }
        Some((media, _)) if media.contains("html") => content.html = body,
        _ => content.text = body,
    }

    content
}

/// Split an entity into lowercase-keyed headers and its body.
///
/// Returns `None` when the header block is malformed.
fn split_entity(entity: &str) -> Option<(HashMap<String, String>, &str)> {
    let mut headers: HashMap<String, String> = HashMap::new();
    let mut last: Option<String> = None;
    let mut offset = 0;

    for line in entity.split_inclusive('\n') {
        offset += line.len();
        let trimmed = line.trim_end_matches('\n');

        if trimmed.is_empty() {
            return Some((headers, &entity[offset..]));
        }

        if trimmed.starts_with(' ') || trimmed.starts_with('\t') {
            // Folded continuation of the previous header.
            let key = last.as_ref()?;
            if let Some(value) = headers.get_mut(key) {
                value.push(' ');
                value.push_str(trimmed.trim());
            }
            continue;
        }

        let (name, value) = trimmed.split_once(':')?;
        let name = name.trim().to_ascii_lowercase();
        headers.entry(name.clone()).or_insert_with(|| value.trim().to_string());
        last = Some(name);
    }

    // Headers only, no body.
    Some((headers, ""))
}

/// Parse `type/subtype; key=value` into the lowercase media type and params.
fn parse_media_type(value: &str) -> Option<(String, HashMap<String, String>)> {
    let mut pieces = value.split(';');
    let media = pieces.next()?.trim().to_ascii_lowercase();
    if !media.contains('/') {
        return None;
    }

    let params = pieces
        .filter_map(|p| p.split_once('='))
        .map(|(k, v)| {
            (
                k.trim().to_ascii_lowercase(),
                v.trim().trim_matches('"').to_string(),
            )
        })
        .collect();

    Some((media, params))
}

fn parse_parts(body: &str, boundary: Option<&str>) -> (String, String) {
    let mut html = String::new();
    let mut text = String::new();

    let Some(boundary) = boundary.filter(|b| !b.is_empty()) else {
        return (html, text);
    };

    for part in split_parts(body, boundary) {
        let Some((headers, part_body)) = split_entity(&part) else {
            continue;
        };
        let raw_type = headers.get("content-type").cloned().unwrap_or_default();
        let part_body = decode_transfer(part_body, headers.get("content-transfer-encoding"));

        match parse_media_type(&raw_type) {
            Some((media, params)) if media.starts_with("multipart/") => {
                let (h, t) = parse_parts(&part_body, params.get("boundary").map(String::as_str));
                if !h.is_empty() {
                    html = h;
                }
                if !t.is_empty() {
                    text = t;
                }
            }
            _ if raw_type.contains("html") => html = part_body,
            _ if raw_type.contains("plain") => text = part_body,
            _ => {}
        }
    }

    (html, text)
}

/// Body parts between `--boundary` delimiters, up to the closing delimiter.
fn split_parts(body: &str, boundary: &str) -> Vec<String> {
    let delimiter = format!("--{}", boundary);
    let closing = format!("--{}--", boundary);

    let mut parts = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in body.lines() {
        let line_trimmed = line.trim_end();
        if line_trimmed == closing {
            if let Some(lines) = current.take() {
                parts.push(lines.join("\n"));
            }
            break;
        }
        if line_trimmed == delimiter {
            if let Some(lines) = current.take() {
                parts.push(lines.join("\n"));
            }
            current = Some(Vec::new());
            continue;
        }
        if let Some(lines) = current.as_mut() {
            lines.push(line);
        }
    }

    parts
}

fn decode_transfer(body: &str, encoding: Option<&String>) -> String {
    match encoding.map(|e| e.trim().to_ascii_lowercase()).as_deref() {
        Some("quoted-printable") => decode_quoted_printable(body),
        Some("base64") => {
            let compact: String = body.split_whitespace().collect();
            BASE64_STANDARD
                .decode(compact.as_bytes())
                .map(|b| String::from_utf8_lossy(&b).into_owned())
                .unwrap_or_else(|_| body.to_string())
        }
        _ => body.to_string(),
    }
}

fn decode_quoted_printable(body: &str) -> String {
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        // Soft line break.
        if bytes.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }
        let hex = bytes
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match hex {
            Some(b) => {
                out.push(b);
                i += 3;
            }
            None => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}
