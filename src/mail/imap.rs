//! IMAP transport over async-imap with rustls TLS.
//!
//! Protocol handling stays inside async-imap; this module only shapes the
//! commands the service needs (SEARCH SINCE, batched UID FETCH, flag STORE,
//! EXPUNGE) and converts responses into [`RawMessage`] candidates.

use std::sync::Arc;

use async_imap::types::Flag;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::warn;

use crate::config::ImapConfig;
use crate::error::MailError;
use crate::mail::message::{MessageFlag, RawMessage};
use crate::mail::transport::{MailTransport, MailboxSession};

type ImapSession = async_imap::Session<TlsStream<TcpStream>>;

/// Opens one TLS IMAP connection per session.
pub struct ImapTransport {
    config: ImapConfig,
    tls: Arc<rustls::ClientConfig>,
}

impl ImapTransport {
    pub fn new(config: ImapConfig) -> Self {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth(),
        );
        Self { config, tls }
    }
}

#[async_trait]
impl MailTransport for ImapTransport {
    async fn open(&self, mailbox: &str) -> Result<Box<dyn MailboxSession>, MailError> {
        if !self.config.is_configured() {
            return Err(MailError::NotConfigured);
        }
        let host = self.config.host.clone();
        let port = self.config.port;

        let tcp = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|e| MailError::Connect {
                host: host.clone(),
                port,
                reason: e.to_string(),
            })?;

        let server_name =
            rustls::pki_types::ServerName::try_from(host.clone()).map_err(|e| MailError::Tls {
                host: host.clone(),
                reason: e.to_string(),
            })?;
        let tls_stream = TlsConnector::from(Arc::clone(&self.tls))
            .connect(server_name, tcp)
            .await
            .map_err(|e| MailError::Tls {
                host: host.clone(),
                reason: e.to_string(),
            })?;

        let client = async_imap::Client::new(tls_stream);
        let mut session = client
            .login(&self.config.username, &self.config.password)
            .await
            .map_err(|(e, _)| MailError::Auth {
                username: self.config.username.clone(),
                reason: e.to_string(),
            })?;

        session.select(mailbox).await.map_err(|e| MailError::Command {
            command: format!("SELECT {mailbox}"),
            reason: e.to_string(),
        })?;

        Ok(Box::new(ImapMailboxSession {
            session,
            mark_as_seen: self.config.mark_as_seen,
        }))
    }
}

struct ImapMailboxSession {
    session: ImapSession,
    mark_as_seen: bool,
}

#[async_trait]
impl MailboxSession for ImapMailboxSession {
    async fn search_since(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<u32>, MailError> {
        let query = since_query(cutoff);
        let uids = self
            .session
            .uid_search(&query)
            .await
            .map_err(|e| MailError::Command {
                command: format!("UID SEARCH {query}"),
                reason: e.to_string(),
            })?;
        Ok(uids.into_iter().collect())
    }

    async fn fetch_raw(&mut self, uids: &[u32]) -> Result<Vec<RawMessage>, MailError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let set = uid_set(uids);
        // BODY[] (as opposed to BODY.PEEK[]) also marks the messages seen.
        let query = if self.mark_as_seen {
            "(UID FLAGS INTERNALDATE BODY[])"
        } else {
            "(UID FLAGS INTERNALDATE BODY.PEEK[])"
        };

        let stream = self
            .session
            .uid_fetch(&set, query)
            .await
            .map_err(|e| MailError::Command {
                command: "UID FETCH".to_string(),
                reason: e.to_string(),
            })?;
        let responses: Vec<_> = stream.collect().await;

        let mut messages = Vec::with_capacity(responses.len());
        for response in responses {
            let fetch = match response {
                Ok(fetch) => fetch,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable fetch response");
                    continue;
                }
            };
            let Some(uid) = fetch.uid else {
                warn!("skipping fetch response without a UID");
                continue;
            };

            let flags: Vec<Flag> = fetch.flags().collect();
            messages.push(RawMessage {
                uid,
                body: fetch.body().map(|b| b.to_vec()).unwrap_or_default(),
                is_read: flags.iter().any(|f| matches!(f, Flag::Seen)),
                is_starred: flags.iter().any(|f| matches!(f, Flag::Flagged)),
                internal_date: fetch.internal_date().map(|d| d.with_timezone(&Utc)),
            });
        }
        Ok(messages)
    }

    async fn store_flag(&mut self, uid: u32, flag: MessageFlag, on: bool) -> Result<(), MailError> {
        let command = format!(
            "{} ({})",
            if on { "+FLAGS" } else { "-FLAGS" },
            flag.imap_name()
        );
        let stream = self
            .session
            .uid_store(uid.to_string(), &command)
            .await
            .map_err(|e| MailError::Command {
                command: format!("UID STORE {uid} {command}"),
                reason: e.to_string(),
            })?;
        let _: Vec<_> = stream.collect().await;
        Ok(())
    }

    async fn expunge(&mut self) -> Result<(), MailError> {
        let stream = self.session.expunge().await.map_err(|e| MailError::Command {
            command: "EXPUNGE".to_string(),
            reason: e.to_string(),
        })?;
        let _: Vec<_> = stream.collect().await;
        Ok(())
    }

    async fn logout(&mut self) {
        let _ = self.session.logout().await;
    }
}

/// RFC 3501 SINCE query for the fetch window.
fn since_query(cutoff: DateTime<Utc>) -> String {
    format!("SINCE {}", cutoff.format("%d-%b-%Y"))
}

/// Comma-joined UID set for a batched FETCH.
fn uid_set(uids: &[u32]) -> String {
    uids.iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_query_uses_imap_date_format() {
        let cutoff = DateTime::from_timestamp(1_787_045_400, 0).unwrap();
        assert_eq!(since_query(cutoff), "SINCE 18-Aug-2026");
    }

    #[test]
    fn uid_set_joins_with_commas() {
        assert_eq!(uid_set(&[30, 20, 10]), "30,20,10");
        assert_eq!(uid_set(&[7]), "7");
    }
}
