//! Transport seams for the mail service.
//!
//! One [`MailboxSession`] wraps one connection: the service opens a session
//! per logical operation and releases it when done, success or failure. Tests
//! swap in scripted transports; production uses the IMAP and SMTP
//! implementations in this module's siblings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{MailError, SendError};
use crate::mail::message::{MessageFlag, OutgoingMail, RawMessage};

/// Opens authenticated sessions against a mailbox.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn open(&self, mailbox: &str) -> Result<Box<dyn MailboxSession>, MailError>;
}

/// One live connection with a mailbox selected.
#[async_trait]
pub trait MailboxSession: Send {
    /// UIDs of messages received on or after `cutoff`.
    async fn search_since(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<u32>, MailError>;

    /// Full raw messages for the given UIDs, in server order.
    async fn fetch_raw(&mut self, uids: &[u32]) -> Result<Vec<RawMessage>, MailError>;

    /// Add or remove one flag on one message.
    async fn store_flag(&mut self, uid: u32, flag: MessageFlag, on: bool) -> Result<(), MailError>;

    /// Permanently remove messages flagged `\Deleted`.
    async fn expunge(&mut self) -> Result<(), MailError>;

    /// Best-effort connection teardown.
    async fn logout(&mut self);
}

/// Delivers outbound mail, returning the transport's Message-ID.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<String, SendError>;
}
