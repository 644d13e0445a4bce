//! MIME encoding of key-value entries
//!
//! Every entry is stored as one message: the key is the `Subject`
//! header and the body of an inline `text/plain` part, the value is the
//! body of a single `application/octet-stream` attachment named
//! `data.bin`.

use crate::error::{Error, Result};
use chrono::Utc;
use mail_builder::MessageBuilder;
use mail_builder::headers::date::Date;
use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use std::iter::FusedIterator;

/// Filename of the attachment carrying the value.
pub const ATTACHMENT_NAME: &str = "data.bin";

/// Content type of the attachment carrying the value.
pub const ATTACHMENT_TYPE: &str = "application/octet-stream";

/// Whether a part is displayed in the body or attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Inline,
    Attachment,
}

/// A leaf MIME part with its transfer encoding already removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub kind: PartKind,
    /// `type/subtype`, lowercased as parsed.
    pub content_type: String,
    pub filename: Option<String>,
    pub body: Vec<u8>,
}

/// Reject keys that cannot be carried in a `Subject` header.
///
/// # Errors
///
/// Returns [`Error::InvalidKey`] for an empty key or one containing a
/// line break.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key is empty".into()));
    }
    if key.contains(['\r', '\n']) {
        return Err(Error::InvalidKey(format!(
            "key {key:?} contains a line break"
        )));
    }
    Ok(())
}

/// Build the MIME message storing `value` under `key`.
///
/// # Errors
///
/// Returns [`Error::InvalidKey`] if the key is unusable or
/// [`Error::Encode`] if the message cannot be written.
pub fn encode(key: &str, value: &[u8]) -> Result<Vec<u8>> {
    validate_key(key)?;

    MessageBuilder::new()
        .date(Date::new(Utc::now().timestamp()))
        .subject(key)
        .text_body(key)
        .attachment(ATTACHMENT_TYPE, ATTACHMENT_NAME, value.to_vec())
        .write_to_vec()
        .map_err(|e| Error::Encode(e.to_string()))
}

/// Extract the value from a stored message.
///
/// Returns the body of the first attachment part, or `None` when the
/// message has no attachment.
///
/// # Errors
///
/// Returns [`Error::Parse`] if `raw` is not a MIME message.
pub fn decode(raw: &[u8]) -> Result<Option<Vec<u8>>> {
    Ok(parts(raw)?
        .find(|p| p.kind == PartKind::Attachment)
        .map(|p| p.body))
}

/// The key a stored message was written under.
///
/// Read from the inline `text/plain` part, which decodes byte for
/// byte; a decoded `Subject` loses leading whitespace and expands
/// anything shaped like an RFC 2047 encoded word. Trailing line breaks
/// are dropped.
///
/// # Errors
///
/// Returns [`Error::Parse`] if `raw` is not a MIME message.
pub fn label(raw: &[u8]) -> Result<Option<String>> {
    Ok(parts(raw)?
        .find(|p| p.kind == PartKind::Inline && p.content_type == "text/plain")
        .map(|p| {
            String::from_utf8_lossy(&p.body)
                .trim_end_matches(['\r', '\n'])
                .to_string()
        }))
}

/// Iterate the leaf parts of a message in document order.
///
/// # Errors
///
/// Returns [`Error::Parse`] if `raw` is not a MIME message.
pub fn parts(raw: &[u8]) -> Result<Parts<'_>> {
    Ok(Parts {
        message: parse(raw)?,
        next: 0,
    })
}

fn parse(raw: &[u8]) -> Result<Message<'_>> {
    if raw.is_empty() {
        return Err(Error::Parse("empty message".into()));
    }
    MessageParser::default()
        .parse(raw)
        .ok_or_else(|| Error::Parse("not a MIME message".into()))
}

/// Leaf parts of a parsed message, produced one at a time.
pub struct Parts<'x> {
    message: Message<'x>,
    next: usize,
}

impl Iterator for Parts<'_> {
    type Item = Part;

    fn next(&mut self) -> Option<Part> {
        while let Some(part) = self.message.parts.get(self.next) {
            self.next += 1;
            if !matches!(part.body, PartType::Multipart(_)) {
                return Some(to_part(part));
            }
        }
        None
    }
}

impl FusedIterator for Parts<'_> {}

fn to_part(part: &MessagePart<'_>) -> Part {
    let kind = if part
        .content_disposition()
        .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"))
    {
        PartKind::Attachment
    } else {
        PartKind::Inline
    };

    let content_type = part.content_type().map_or_else(
        || "text/plain".to_string(),
        |ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub).to_ascii_lowercase(),
            None => ct.ctype().to_ascii_lowercase(),
        },
    );

    Part {
        kind,
        content_type,
        filename: part.attachment_name().map(str::to_string),
        body: part.contents().to_vec(),
    }
}
