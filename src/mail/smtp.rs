//! Outbound mail via lettre, plus a log-only fallback.
//!
//! Delivery uses lettre's blocking SMTP transport under `spawn_blocking`.
//! Transport failures collapse into the four categories the dashboard
//! reports: auth, connection, timeout, other.

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::{Mailbox, MultiPart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;
use uuid::Uuid;

use crate::config::SmtpConfig;
use crate::error::SendError;
use crate::mail::message::OutgoingMail;
use crate::mail::transport::MailSender;

/// Sender relaying through a configured SMTP host.
pub struct SmtpSender {
    config: SmtpConfig,
}

impl SmtpSender {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailSender for SmtpSender {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<String, SendError> {
        let message_id = generate_message_id(&mail.from);
        let message = build_message(mail, &message_id)?;
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || send_blocking(&config, &message))
            .await
            .map_err(|e| SendError::Transport(format!("send task failed: {e}")))??;

        info!(message_id = %message_id, "email delivered via SMTP");
        Ok(message_id)
    }
}

/// Fallback sender used when SMTP is unconfigured. Records the outbound
/// message in the log and fabricates a message id so compose flows still
/// complete in development.
pub struct LogSender;

#[async_trait]
impl MailSender for LogSender {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<String, SendError> {
        info!(
            to = %mail.to,
            subject = %mail.subject,
            "SMTP not configured, logging outbound email instead of sending"
        );
        Ok(format!("mock-{}", Utc::now().timestamp_millis()))
    }
}

fn send_blocking(config: &SmtpConfig, message: &Message) -> Result<(), SendError> {
    let creds = Credentials::new(config.username.clone(), config.password.clone());

    // Port 465 speaks TLS from the first byte; everything else upgrades via
    // STARTTLS.
    let builder = if config.port == 465 {
        SmtpTransport::relay(&config.host)
    } else {
        SmtpTransport::starttls_relay(&config.host)
    }
    .map_err(|e| classify_smtp_error(&e))?;

    let transport = builder.port(config.port).credentials(creds).build();

    transport
        .send(message)
        .map_err(|e| classify_smtp_error(&e))?;
    Ok(())
}

/// Map a lettre SMTP error onto the dashboard's failure categories.
fn classify_smtp_error(e: &lettre::transport::smtp::Error) -> SendError {
    if e.is_timeout() {
        return SendError::TimedOut;
    }
    if let Some(code) = e.status() {
        // 530/534/535 are the authentication reply family.
        if code.to_string().starts_with("53") {
            return SendError::AuthFailed;
        }
        return SendError::Transport(e.to_string());
    }
    if e.is_client() {
        return SendError::Transport(e.to_string());
    }
    SendError::ConnectFailed
}

fn build_message(mail: &OutgoingMail, message_id: &str) -> Result<Message, SendError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(&mail.from)?)
        .subject(mail.subject.clone())
        .message_id(Some(message_id.to_string()))
        .header(header::UserAgent::from("maildeck".to_string()));

    for recipient in split_recipients(&mail.to) {
        builder = builder.to(parse_mailbox(recipient)?);
    }
    if let Some(cc) = &mail.cc {
        for recipient in split_recipients(cc) {
            builder = builder.cc(parse_mailbox(recipient)?);
        }
    }
    if let Some(bcc) = &mail.bcc {
        for recipient in split_recipients(bcc) {
            builder = builder.bcc(parse_mailbox(recipient)?);
        }
    }

    match (&mail.text, &mail.html) {
        (Some(text), Some(html)) => builder.multipart(MultiPart::alternative_plain_html(
            text.clone(),
            html.clone(),
        )),
        (Some(text), None) => builder
            .header(header::ContentType::TEXT_PLAIN)
            .body(text.clone()),
        (None, Some(html)) => builder
            .header(header::ContentType::TEXT_HTML)
            .body(html.clone()),
        (None, None) => return Err(SendError::NoContent),
    }
    .map_err(|e| SendError::Transport(format!("failed to build message: {e}")))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SendError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|_| SendError::InvalidRecipient(address.trim().to_string()))
}

/// Split a comma separated recipient list, dropping blanks.
pub fn split_recipients(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// RFC 5322 Message-ID scoped to the sender's domain.
fn generate_message_id(from: &str) -> String {
    let domain = from
        .split_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|d| !d.is_empty())
        .unwrap_or("localhost");
    format!(
        "<{}.{}@{}>",
        Utc::now().timestamp_millis(),
        Uuid::new_v4(),
        domain
    )
}
