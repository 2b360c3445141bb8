//! Mailbox access: IMAP reads, SMTP sends, the shared inbox cache, and the
//! HTTP endpoints in front of them.

pub mod cache;
pub mod imap;
pub mod message;
pub mod routes;
pub mod service;
pub mod smtp;
pub mod transport;

pub use imap::ImapTransport;
pub use message::{Email, OutgoingMail};
pub use routes::{MailRouteState, mail_routes};
pub use service::{DeleteSummary, MailService, MailServiceConfig};
pub use smtp::{LogSender, SmtpSender};
pub use transport::{MailSender, MailTransport, MailboxSession};
