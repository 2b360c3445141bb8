//! Single-slot cache for the most recent inbox page.
//!
//! The whole service shares one slot: it either holds the full result of the
//! last successful fetch or nothing. A read inside the TTL returns the page
//! verbatim; any successful mutation drops the slot so the next read goes
//! back to the mailbox.

use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::mail::message::Email;

#[derive(Debug, Clone)]
struct CachedPage {
    emails: Vec<Email>,
    fetched_at: Instant,
}

/// Slot holding the most recently fetched inbox page.
#[derive(Debug, Default)]
pub struct InboxCache {
    slot: RwLock<Option<CachedPage>>,
}

impl InboxCache {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Return the cached page if it was captured less than `ttl` ago.
    ///
    /// An expired slot is cleared on the way out, so a stale page is never
    /// observable again even with a longer `ttl`.
    pub async fn get(&self, ttl: Duration) -> Option<Vec<Email>> {
        {
            let guard = self.slot.read().await;
            match guard.as_ref() {
                Some(page) if page.fetched_at.elapsed() < ttl => {
                    return Some(page.emails.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        let mut guard = self.slot.write().await;
        if let Some(page) = guard.as_ref()
            && page.fetched_at.elapsed() < ttl
        {
            // Refilled while we waited for the write lock.
            return Some(page.emails.clone());
        }
        *guard = None;
        None
    }

    /// Replace the slot wholesale with a freshly fetched page.
    pub async fn store(&self, emails: Vec<Email>) {
        let mut guard = self.slot.write().await;
        *guard = Some(CachedPage {
            emails,
            fetched_at: Instant::now(),
        });
    }

    /// Drop the slot unconditionally.
    pub async fn invalidate(&self) {
        let mut guard = self.slot.write().await;
        *guard = None;
    }
}
