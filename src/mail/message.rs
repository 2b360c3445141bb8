//! Message read model and RFC 5322 parsing.
//!
//! The dashboard works with a flattened [`Email`] view of each message;
//! parsing rides mail-parser rather than interpreting MIME by hand. A
//! candidate that cannot be turned into an `Email` is tagged with a
//! [`ParseSkip`] so fetch can drop it without failing the whole page.

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use serde::{Deserialize, Serialize};

/// IMAP flags the dashboard mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFlag {
    Seen,
    Flagged,
    Deleted,
}

impl MessageFlag {
    pub fn imap_name(&self) -> &'static str {
        match self {
            MessageFlag::Seen => "\\Seen",
            MessageFlag::Flagged => "\\Flagged",
            MessageFlag::Deleted => "\\Deleted",
        }
    }
}

/// An undecoded message as it came off the wire, with server-side metadata.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub uid: u32,
    pub body: Vec<u8>,
    pub is_read: bool,
    pub is_starred: bool,
    pub internal_date: Option<DateTime<Utc>>,
}

/// Why a fetched candidate was dropped from the page.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseSkip {
    #[error("message body was empty")]
    EmptyBody,

    #[error("message could not be parsed")]
    Unparsable,

    #[error("message had no readable content")]
    NoContent,
}

/// Flattened message view served to the dashboard.
///
/// `id` is the mailbox UID rendered as a string and keys every cache lookup
/// and mutation. Timestamps serialize as RFC 3339.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub id: String,
    pub message_id: Option<String>,
    pub from: String,
    pub to: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    /// `name:size` pairs, comma joined.
    pub attachments: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub size: usize,
    /// Raw header section of the message, kept opaque.
    pub headers: Option<String>,
    pub is_read: bool,
    pub is_starred: bool,
    /// Set only on locally constructed sent records.
    pub sender_id: Option<String>,
}

/// Outbound message as submitted by the compose form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutgoingMail {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    #[serde(default)]
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
}

impl Email {
    /// Parse one fetched candidate into the dashboard view.
    pub fn from_raw(raw: &RawMessage) -> Result<Self, ParseSkip> {
        if raw.body.is_empty() {
            return Err(ParseSkip::EmptyBody);
        }

        let parsed = MessageParser::default()
            .parse(&raw.body)
            .ok_or(ParseSkip::Unparsable)?;

        let body_text = parsed
            .body_text(0)
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty());
        let body_html = parsed
            .body_html(0)
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty());
        if body_text.is_none() && body_html.is_none() {
            return Err(ParseSkip::NoContent);
        }

        let from = parsed
            .from()
            .and_then(|a| a.first())
            .and_then(|a| a.address())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown@unknown.com".to_string());

        let sent_at = parsed
            .date()
            .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
            .or(raw.internal_date)
            .unwrap_or_else(Utc::now);
        let received_at = raw.internal_date.unwrap_or(sent_at);

        let attachments: Vec<String> = parsed
            .attachments()
            .map(|att| {
                let name = att.attachment_name().unwrap_or("attachment");
                format!("{}:{}", name, att.len())
            })
            .collect();

        let size = body_text.as_ref().map_or(0, |s| s.len())
            + body_html.as_ref().map_or(0, |s| s.len());

        Ok(Email {
            id: raw.uid.to_string(),
            message_id: Some(
                parsed
                    .message_id()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("imap-{}", raw.uid)),
            ),
            from,
            to: address_list(parsed.to()).unwrap_or_default(),
            cc: address_list(parsed.cc()),
            bcc: address_list(parsed.bcc()),
            subject: parsed.subject().unwrap_or("(No Subject)").to_string(),
            body_text,
            body_html,
            attachments: if attachments.is_empty() {
                None
            } else {
                Some(attachments.join(","))
            },
            sent_at,
            received_at,
            size,
            headers: header_blob(&raw.body),
            is_read: raw.is_read,
            is_starred: raw.is_starred,
            sender_id: None,
        })
    }

    /// Build the record returned after a successful send. Never cached; the
    /// mailbox stays the source of truth for the inbox.
    pub fn sent_record(mail: &OutgoingMail, message_id: String, sender_id: &str) -> Self {
        let now = Utc::now();
        let size = mail
            .text
            .as_ref()
            .map(|t| t.len())
            .or_else(|| mail.html.as_ref().map(|h| h.len()))
            .unwrap_or(0);

        Email {
            id: format!("sent-{}", now.timestamp_millis()),
            message_id: Some(message_id),
            from: mail.from.clone(),
            to: mail.to.clone(),
            cc: mail.cc.clone(),
            bcc: mail.bcc.clone(),
            subject: mail.subject.clone(),
            body_text: mail.text.clone(),
            body_html: mail.html.clone(),
            attachments: None,
            sent_at: now,
            received_at: now,
            size,
            headers: None,
            is_read: true,
            is_starred: false,
            sender_id: Some(sender_id.to_string()),
        }
    }
}

/// Comma-join the plain addresses of an address header.
fn address_list(addr: Option<&mail_parser::Address>) -> Option<String> {
    let list: Vec<String> = addr?
        .iter()
        .filter_map(|a| a.address())
        .map(|s| s.to_string())
        .collect();
    if list.is_empty() {
        None
    } else {
        Some(list.join(", "))
    }
}

/// Slice the raw header section (everything before the first blank line).
fn header_blob(body: &[u8]) -> Option<String> {
    let end = body
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .unwrap_or(body.len());
    let section = String::from_utf8_lossy(&body[..end]).trim().to_string();
    if section.is_empty() { None } else { Some(section) }
}
