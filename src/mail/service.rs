//! Mail access service: cached reads, fail-open fetches, fail-closed
//! mutations.
//!
//! Reads never surface transport errors (a broken mailbox renders as an
//! empty inbox); mutations report their errors and only invalidate the
//! cached page after the server accepted the change. Nothing here retries.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::ImapConfig;
use crate::error::{MailError, SendError};
use crate::mail::cache::InboxCache;
use crate::mail::message::{Email, MessageFlag, OutgoingMail};
use crate::mail::smtp::split_recipients;
use crate::mail::transport::{MailSender, MailTransport, MailboxSession};

/// Address shape accepted for senders and recipients.
static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Tuning knobs for the service.
#[derive(Debug, Clone)]
pub struct MailServiceConfig {
    /// Mailbox opened when the caller does not name one; mutations always
    /// target this mailbox.
    pub mailbox: String,
    /// Page size when the caller does not pass a limit.
    pub fetch_limit: usize,
    /// Wider page used when a single-message lookup misses the cache.
    pub lookup_limit: usize,
    /// How far back fetches search.
    pub window_days: i64,
    /// How long a fetched page stays valid.
    pub cache_ttl: Duration,
}

impl Default for MailServiceConfig {
    fn default() -> Self {
        Self {
            mailbox: "INBOX".to_string(),
            fetch_limit: 50,
            lookup_limit: 100,
            window_days: 30,
            cache_ttl: Duration::from_secs(60),
        }
    }
}

impl MailServiceConfig {
    pub fn from_imap(config: &ImapConfig) -> Self {
        Self {
            mailbox: config.mailbox.clone(),
            fetch_limit: config.fetch_limit,
            ..Self::default()
        }
    }
}

/// Outcome tally of a bulk delete.
#[derive(Debug)]
pub struct DeleteSummary {
    pub deleted: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// The one shared view of the mailbox behind the dashboard.
pub struct MailService {
    transport: Arc<dyn MailTransport>,
    sender: Arc<dyn MailSender>,
    cache: InboxCache,
    config: MailServiceConfig,
}

impl MailService {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        sender: Arc<dyn MailSender>,
        config: MailServiceConfig,
    ) -> Self {
        Self {
            transport,
            sender,
            cache: InboxCache::new(),
            config,
        }
    }

    /// The current inbox page.
    ///
    /// A cache hit is returned verbatim, whatever `mailbox` or `limit` say.
    /// On a miss the page is rebuilt from the mailbox and cached; any
    /// transport failure renders as an empty page, never an error.
    pub async fn fetch_messages(&self, mailbox: Option<&str>, limit: Option<usize>) -> Vec<Email> {
        if let Some(cached) = self.cache.get(self.config.cache_ttl).await {
            debug!(count = cached.len(), "serving inbox page from cache");
            return cached;
        }

        match self.fetch_from_mailbox(mailbox, limit).await {
            Ok(emails) => {
                info!(count = emails.len(), "fetched inbox page from mailbox");
                self.cache.store(emails.clone()).await;
                emails
            }
            Err(e) => {
                warn!(error = %e, "inbox fetch failed, returning empty page");
                Vec::new()
            }
        }
    }

    /// Look up one message by id: cached page first, then one wider fetch.
    /// A miss is `None`, not an error.
    pub async fn get_message(&self, id: &str) -> Option<Email> {
        if let Some(cached) = self.cache.get(self.config.cache_ttl).await
            && let Some(email) = cached.into_iter().find(|e| e.id == id)
        {
            return Some(email);
        }
        self.fetch_messages(None, Some(self.config.lookup_limit))
            .await
            .into_iter()
            .find(|e| e.id == id)
    }

    pub async fn set_starred(&self, id: &str, starred: bool) -> Result<(), MailError> {
        self.store_flag(id, MessageFlag::Flagged, starred).await
    }

    pub async fn set_read(&self, id: &str, read: bool) -> Result<(), MailError> {
        self.store_flag(id, MessageFlag::Seen, read).await
    }

    /// Flag a message `\Deleted` and expunge. A failed expunge is logged and
    /// tolerated; the flag already stuck.
    pub async fn delete_message(&self, id: &str) -> Result<(), MailError> {
        let uid = parse_uid(id)?;
        let mut session = self.transport.open(&self.config.mailbox).await?;
        let result = delete_in_session(session.as_mut(), uid).await;
        session.logout().await;
        result?;

        self.cache.invalidate().await;
        info!(uid, "deleted message");
        Ok(())
    }

    /// Delete several messages concurrently, one connection each, and tally
    /// the outcomes. Never errors as a whole.
    pub async fn delete_messages(&self, ids: &[String]) -> DeleteSummary {
        let results = join_all(ids.iter().map(|id| self.delete_message(id))).await;

        let mut summary = DeleteSummary {
            deleted: 0,
            failed: 0,
            errors: Vec::new(),
        };
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(()) => summary.deleted += 1,
                Err(e) => {
                    summary.failed += 1;
                    summary.errors.push(format!("{id}: {e}"));
                }
            }
        }
        info!(
            deleted = summary.deleted,
            failed = summary.failed,
            "bulk delete finished"
        );
        summary
    }

    /// Validate and deliver an outbound message.
    ///
    /// Validation happens before the transport is touched. The returned
    /// record is built locally and never cached; the next inbox read still
    /// reflects the mailbox.
    pub async fn send_message(
        &self,
        mail: &OutgoingMail,
        sender_id: &str,
    ) -> Result<Email, SendError> {
        validate_outgoing(mail)?;
        let message_id = self.sender.deliver(mail).await?;
        info!(message_id = %message_id, to = %mail.to, "sent email");
        Ok(Email::sent_record(mail, message_id, sender_id))
    }

    async fn fetch_from_mailbox(
        &self,
        mailbox: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Email>, MailError> {
        let mailbox = mailbox.unwrap_or(&self.config.mailbox);
        let limit = limit.unwrap_or(self.config.fetch_limit);

        let mut session = self.transport.open(mailbox).await?;
        let result = fetch_page(session.as_mut(), self.config.window_days, limit).await;
        session.logout().await;
        result
    }

    async fn store_flag(&self, id: &str, flag: MessageFlag, on: bool) -> Result<(), MailError> {
        let uid = parse_uid(id)?;
        let mut session = self.transport.open(&self.config.mailbox).await?;
        let result = session.store_flag(uid, flag, on).await;
        session.logout().await;
        result?;

        self.cache.invalidate().await;
        info!(uid, flag = flag.imap_name(), on, "updated message flag");
        Ok(())
    }
}

/// Search the window, keep the newest `limit` UIDs, fetch and parse them.
/// Candidates that fail to parse are dropped one by one.
async fn fetch_page(
    session: &mut dyn MailboxSession,
    window_days: i64,
    limit: usize,
) -> Result<Vec<Email>, MailError> {
    let cutoff = Utc::now() - ChronoDuration::days(window_days);
    let mut uids = session.search_since(cutoff).await?;
    uids.sort_unstable_by(|a, b| b.cmp(a));
    uids.truncate(limit);

    let raw = session.fetch_raw(&uids).await?;
    let mut emails = Vec::with_capacity(raw.len());
    for candidate in &raw {
        match Email::from_raw(candidate) {
            Ok(email) => emails.push(email),
            Err(skip) => debug!(uid = candidate.uid, reason = %skip, "dropping candidate"),
        }
    }

    emails.sort_unstable_by(|a, b| numeric_id(&b.id).cmp(&numeric_id(&a.id)));
    Ok(emails)
}

async fn delete_in_session(session: &mut dyn MailboxSession, uid: u32) -> Result<(), MailError> {
    session.store_flag(uid, MessageFlag::Deleted, true).await?;
    if let Err(e) = session.expunge().await {
        // The flag stuck; the server drops the message on its own schedule.
        warn!(uid, error = %e, "expunge after delete failed");
    }
    Ok(())
}

fn validate_outgoing(mail: &OutgoingMail) -> Result<(), SendError> {
    if mail.from.trim().is_empty() || mail.to.trim().is_empty() || mail.subject.trim().is_empty() {
        return Err(SendError::MissingFields);
    }
    if !ADDRESS_RE.is_match(mail.from.trim()) {
        return Err(SendError::InvalidSender);
    }
    let lists = [Some(mail.to.as_str()), mail.cc.as_deref(), mail.bcc.as_deref()];
    for list in lists.into_iter().flatten() {
        for recipient in split_recipients(list) {
            if !ADDRESS_RE.is_match(recipient) {
                return Err(SendError::InvalidRecipient(recipient.to_string()));
            }
        }
    }
    let has_text = mail.text.as_deref().is_some_and(|t| !t.is_empty());
    let has_html = mail.html.as_deref().is_some_and(|h| !h.is_empty());
    if !has_text && !has_html {
        return Err(SendError::NoContent);
    }
    Ok(())
}

fn parse_uid(id: &str) -> Result<u32, MailError> {
    id.parse()
        .map_err(|_| MailError::NotFound { id: id.to_string() })
}

fn numeric_id(id: &str) -> u32 {
    id.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::mail::message::RawMessage;

    /// Shared scripted mailbox; every `open` hands out a session over the
    /// same state and bumps the connection counter.
    #[derive(Default)]
    struct MockState {
        messages: Mutex<Vec<RawMessage>>,
        flagged_deleted: Mutex<HashSet<u32>>,
        opens: AtomicUsize,
        last_fetch_len: AtomicUsize,
        fail_open: AtomicBool,
        fail_search: AtomicBool,
        fail_store_all: AtomicBool,
        fail_store_uids: Mutex<HashSet<u32>>,
        fail_expunge: AtomicBool,
    }

    struct MockTransport {
        state: Arc<MockState>,
    }

    #[async_trait]
    impl MailTransport for MockTransport {
        async fn open(&self, _mailbox: &str) -> Result<Box<dyn MailboxSession>, MailError> {
            self.state.opens.fetch_add(1, Ordering::SeqCst);
            if self.state.fail_open.load(Ordering::SeqCst) {
                return Err(MailError::Connect {
                    host: "mock".to_string(),
                    port: 993,
                    reason: "scripted failure".to_string(),
                });
            }
            Ok(Box::new(MockSession {
                state: Arc::clone(&self.state),
            }))
        }
    }

    struct MockSession {
        state: Arc<MockState>,
    }

    #[async_trait]
    impl MailboxSession for MockSession {
        async fn search_since(
            &mut self,
            _cutoff: chrono::DateTime<Utc>,
        ) -> Result<Vec<u32>, MailError> {
            if self.state.fail_search.load(Ordering::SeqCst) {
                return Err(MailError::Command {
                    command: "UID SEARCH".to_string(),
                    reason: "scripted failure".to_string(),
                });
            }
            Ok(self
                .state
                .messages
                .lock()
                .unwrap()
                .iter()
                .map(|m| m.uid)
                .collect())
        }

        async fn fetch_raw(&mut self, uids: &[u32]) -> Result<Vec<RawMessage>, MailError> {
            self.state.last_fetch_len.store(uids.len(), Ordering::SeqCst);
            let wanted: HashSet<u32> = uids.iter().copied().collect();
            Ok(self
                .state
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| wanted.contains(&m.uid))
                .cloned()
                .collect())
        }

        async fn store_flag(
            &mut self,
            uid: u32,
            flag: MessageFlag,
            on: bool,
        ) -> Result<(), MailError> {
            if self.state.fail_store_all.load(Ordering::SeqCst)
                || self.state.fail_store_uids.lock().unwrap().contains(&uid)
            {
                return Err(MailError::Command {
                    command: "UID STORE".to_string(),
                    reason: "scripted failure".to_string(),
                });
            }
            let mut messages = self.state.messages.lock().unwrap();
            let Some(message) = messages.iter_mut().find(|m| m.uid == uid) else {
                return Err(MailError::NotFound { id: uid.to_string() });
            };
            match flag {
                MessageFlag::Seen => message.is_read = on,
                MessageFlag::Flagged => message.is_starred = on,
                MessageFlag::Deleted => {
                    self.state.flagged_deleted.lock().unwrap().insert(uid);
                }
            }
            Ok(())
        }

        async fn expunge(&mut self) -> Result<(), MailError> {
            if self.state.fail_expunge.load(Ordering::SeqCst) {
                return Err(MailError::Command {
                    command: "EXPUNGE".to_string(),
                    reason: "scripted failure".to_string(),
                });
            }
            let doomed = std::mem::take(&mut *self.state.flagged_deleted.lock().unwrap());
            self.state
                .messages
                .lock()
                .unwrap()
                .retain(|m| !doomed.contains(&m.uid));
            Ok(())
        }

        async fn logout(&mut self) {}
    }

    #[derive(Default)]
    struct MockSender {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl MailSender for MockSender {
        async fn deliver(&self, _mail: &OutgoingMail) -> Result<String, SendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(SendError::ConnectFailed);
            }
            Ok("<sent-1@mock>".to_string())
        }
    }

    fn raw(uid: u32) -> RawMessage {
        let body = format!(
            "From: dana@fundco.com\r\nTo: deals@fundco.com\r\nSubject: msg {uid}\r\n\r\nbody {uid}\r\n"
        );
        RawMessage {
            uid,
            body: body.into_bytes(),
            is_read: false,
            is_starred: false,
            internal_date: DateTime::from_timestamp(1_780_000_000 + uid as i64, 0),
        }
    }

    fn setup(uids: &[u32]) -> (MailService, Arc<MockState>, Arc<MockSender>) {
        let state = Arc::new(MockState::default());
        *state.messages.lock().unwrap() = uids.iter().map(|u| raw(*u)).collect();
        let sender = Arc::new(MockSender::default());
        let service = MailService::new(
            Arc::new(MockTransport {
                state: Arc::clone(&state),
            }),
            Arc::clone(&sender) as Arc<dyn MailSender>,
            MailServiceConfig::default(),
        );
        (service, state, sender)
    }

    fn outgoing() -> OutgoingMail {
        OutgoingMail {
            from: "admin@fundco.com".to_string(),
            to: "lp@example.com".to_string(),
            cc: None,
            bcc: None,
            subject: "Intro".to_string(),
            text: Some("Hello".to_string()),
            html: None,
        }
    }

    #[tokio::test]
    async fn fetch_returns_newest_first_and_truncates() {
        let (service, state, _) = setup(&[3, 1, 5, 2, 4]);

        let page = service.fetch_messages(None, Some(3)).await;

        let ids: Vec<&str> = page.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["5", "4", "3"]);
        assert_eq!(state.last_fetch_len.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn second_fetch_within_ttl_hits_the_cache() {
        let (service, state, _) = setup(&[1, 2]);

        service.fetch_messages(None, None).await;
        tokio::time::advance(Duration::from_secs(30)).await;
        let page = service.fetch_messages(None, None).await;

        assert_eq!(page.len(), 2);
        assert_eq!(state.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_after_ttl_goes_back_to_the_mailbox() {
        let (service, state, _) = setup(&[1, 2]);

        service.fetch_messages(None, None).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        service.fetch_messages(None, None).await;

        assert_eq!(state.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_failure_is_an_empty_page_and_is_not_cached() {
        let (service, state, _) = setup(&[1, 2]);
        state.fail_open.store(true, Ordering::SeqCst);

        assert!(service.fetch_messages(None, None).await.is_empty());

        // Recovery is immediate because the failure never populated the slot.
        state.fail_open.store(false, Ordering::SeqCst);
        assert_eq!(service.fetch_messages(None, None).await.len(), 2);
        assert_eq!(state.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn search_failure_also_fails_open() {
        let (service, state, _) = setup(&[1]);
        state.fail_search.store(true, Ordering::SeqCst);
        assert!(service.fetch_messages(None, None).await.is_empty());
    }

    #[tokio::test]
    async fn unparsable_candidates_are_dropped_silently() {
        let (service, state, _) = setup(&[1, 2, 3]);
        state
            .messages
            .lock()
            .unwrap()
            .iter_mut()
            .find(|m| m.uid == 2)
            .unwrap()
            .body
            .clear();

        let page = service.fetch_messages(None, None).await;
        let ids: Vec<&str> = page.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1"]);
    }

    #[tokio::test]
    async fn mutation_invalidates_the_cache() {
        let (service, state, _) = setup(&[1, 2]);

        let before = service.fetch_messages(None, None).await;
        assert!(!before.iter().any(|e| e.is_starred));

        service.set_starred("2", true).await.unwrap();
        let after = service.fetch_messages(None, None).await;

        // One open per fetch plus one for the mutation.
        assert_eq!(state.opens.load(Ordering::SeqCst), 3);
        assert!(after.iter().find(|e| e.id == "2").unwrap().is_starred);
    }

    #[tokio::test]
    async fn failed_mutation_keeps_the_cached_page() {
        let (service, state, _) = setup(&[1, 2]);

        service.fetch_messages(None, None).await;
        state.fail_store_all.store(true, Ordering::SeqCst);
        assert!(service.set_starred("2", true).await.is_err());

        service.fetch_messages(None, None).await;
        // Fetch, failed store, and nothing else: the page was still cached.
        assert_eq!(state.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn set_read_round_trips_through_the_mailbox() {
        let (service, _, _) = setup(&[1]);
        service.set_read("1", true).await.unwrap();
        let page = service.fetch_messages(None, None).await;
        assert!(page[0].is_read);
    }

    #[tokio::test]
    async fn mutation_with_a_non_numeric_id_never_connects() {
        let (service, state, _) = setup(&[1]);
        assert!(service.set_starred("sent-1234", true).await.is_err());
        assert_eq!(state.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn get_message_prefers_the_cached_page() {
        let (service, state, _) = setup(&[1, 2]);

        service.fetch_messages(None, None).await;
        let email = service.get_message("2").await.unwrap();

        assert_eq!(email.subject, "msg 2");
        assert_eq!(state.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_message_missing_from_a_valid_cache_stays_local() {
        let (service, state, _) = setup(&[1, 2]);

        service.fetch_messages(None, None).await;
        assert!(service.get_message("99").await.is_none());

        // The valid cache answered both lookups; no second connection.
        assert_eq!(state.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cold_lookup_fetches_a_wider_page() {
        let uids: Vec<u32> = (1..=120).collect();
        let (service, state, _) = setup(&uids);

        let email = service.get_message("50").await;

        assert!(email.is_some());
        assert_eq!(state.last_fetch_len.load(Ordering::SeqCst), 100);
    }

    #[tokio::test]
    async fn delete_tolerates_a_failed_expunge() {
        let (service, state, _) = setup(&[1, 2]);
        state.fail_expunge.store(true, Ordering::SeqCst);

        service.fetch_messages(None, None).await;
        service.delete_message("1").await.unwrap();

        // Cache was invalidated despite the expunge failure.
        service.fetch_messages(None, None).await;
        assert_eq!(state.opens.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn delete_removes_the_message() {
        let (service, _, _) = setup(&[1, 2]);
        service.delete_message("1").await.unwrap();
        let page = service.fetch_messages(None, None).await;
        let ids: Vec<&str> = page.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[tokio::test]
    async fn bulk_delete_tallies_successes_and_failures() {
        let (service, state, _) = setup(&[1, 2, 3, 4, 5]);
        state.fail_store_uids.lock().unwrap().extend([2, 4]);

        let ids: Vec<String> = (1..=5).map(|u: u32| u.to_string()).collect();
        let summary = service.delete_messages(&ids).await;

        assert_eq!(summary.deleted, 3);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.errors.len(), 2);
        assert!(summary.errors.iter().any(|e| e.starts_with("2:")));
    }

    #[tokio::test]
    async fn send_validates_before_touching_the_transport() {
        let (service, _, sender) = setup(&[]);

        let mut missing = outgoing();
        missing.to = String::new();
        assert!(matches!(
            service.send_message(&missing, "admin").await,
            Err(SendError::MissingFields)
        ));

        let mut bad_sender = outgoing();
        bad_sender.from = "not an address".to_string();
        assert!(matches!(
            service.send_message(&bad_sender, "admin").await,
            Err(SendError::InvalidSender)
        ));

        let mut bad_recipient = outgoing();
        bad_recipient.cc = Some("ok@example.com, nope".to_string());
        assert!(matches!(
            service.send_message(&bad_recipient, "admin").await,
            Err(SendError::InvalidRecipient(addr)) if addr == "nope"
        ));

        let mut empty = outgoing();
        empty.text = None;
        assert!(matches!(
            service.send_message(&empty, "admin").await,
            Err(SendError::NoContent)
        ));

        assert_eq!(sender.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn send_returns_a_local_record_and_leaves_the_cache_alone() {
        let (service, state, sender) = setup(&[1]);

        service.fetch_messages(None, None).await;
        let email = service.send_message(&outgoing(), "admin").await.unwrap();

        assert!(email.id.starts_with("sent-"));
        assert!(email.is_read);
        assert_eq!(email.sender_id.as_deref(), Some("admin"));
        assert_eq!(email.message_id.as_deref(), Some("<sent-1@mock>"));
        assert_eq!(sender.calls.load(Ordering::SeqCst), 1);

        // The sent record never lands in the cache and the page stays valid.
        let page = service.fetch_messages(None, None).await;
        assert_eq!(page.len(), 1);
        assert_eq!(state.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_transport_failure_propagates() {
        let (service, _, sender) = setup(&[]);
        sender.fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            service.send_message(&outgoing(), "admin").await,
            Err(SendError::ConnectFailed)
        ));
    }

    #[tokio::test]
    async fn empty_recipient_entries_are_ignored_by_validation() {
        let mail = OutgoingMail {
            to: "a@example.com, , b@example.com,".to_string(),
            ..outgoing()
        };
        assert!(validate_outgoing(&mail).is_ok());
    }
}
