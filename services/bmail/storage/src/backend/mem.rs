//! In-memory mail store for development and testing

use crate::{MailQuery, MailStore, StorageError, DEFAULT_MAILBOX_QUOTA};
use async_trait::async_trait;
use bmail_crypto::Address;
use bmail_wire::{
    CryptEnvelope, DeleteOutcome, DeleteResult, Direction, ListEntry, MailboxStats, Pack,
    StateAck,
};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// Envelope shared between every box it was delivered to
#[derive(Debug, Clone)]
struct StoredMail {
    envelope: Arc<CryptEnvelope>,
    /// Encoded size in bytes
    size: i64,
}

#[derive(Debug, Default)]
struct Mailbox {
    received: Vec<StoredMail>,
    sent: Vec<StoredMail>,
}

impl Mailbox {
    fn received_size(&self) -> i64 {
        self.received.iter().map(|m| m.size).sum()
    }
}

fn contains(mails: &[StoredMail], eid: &Uuid) -> bool {
    mails.iter().any(|m| &m.envelope.eid == eid)
}

/// Received mail past the query cursor, in page order
fn select<'a>(mailbox: &'a Mailbox, query: &MailQuery) -> Vec<&'a StoredMail> {
    let mut page: Vec<&StoredMail> = mailbox
        .received
        .iter()
        .filter(|m| query.admits(m.envelope.date, &m.envelope.eid))
        .collect();
    page.sort_by_key(|m| (m.envelope.date, m.envelope.eid));
    if query.direction == Direction::OlderThan {
        page.reverse();
    }
    page.truncate(query.limit);
    page
}

fn stats(mails: &[StoredMail], quota: i64, before_time: i64) -> MailboxStats {
    let counted: Vec<_> = mails
        .iter()
        .filter(|m| m.envelope.date < before_time)
        .collect();
    MailboxStats {
        total_space: quota,
        used_size: counted.iter().map(|m| m.size).sum(),
        total_count: u32::try_from(counted.len()).unwrap_or(u32::MAX),
    }
}

/// In-memory mail store
pub struct MemoryMailStore {
    /// Per-address mailboxes
    boxes: Arc<DashMap<Address, Mailbox>>,
    /// Received-box quota in bytes
    quota: i64,
    /// Serializes stores so a quota check holds until the write
    store_lock: Mutex<()>,
}

impl MemoryMailStore {
    /// Create a store with the default quota
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_MAILBOX_QUOTA)
    }

    /// Create a store limiting each received box to `quota` bytes
    pub fn with_quota(quota: i64) -> Self {
        Self {
            boxes: Arc::new(DashMap::new()),
            quota,
            store_lock: Mutex::new(()),
        }
    }

    fn store_locked(&self, envelope: &CryptEnvelope, size: i64) -> Result<usize, StorageError> {
        let _guard = self.store_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut owners: Vec<Address> = envelope.recipients.iter().map(|r| r.address).collect();
        owners.sort();
        owners.dedup();

        // Nothing is written unless every recipient has room
        for owner in &owners {
            let used = self
                .boxes
                .get(owner)
                .map(|b| b.received_size())
                .unwrap_or(0);
            if used + size > self.quota {
                return Err(StorageError::QuotaExceeded(*owner));
            }
        }

        let stored = StoredMail {
            envelope: Arc::new(envelope.clone()),
            size,
        };

        let mut written = 0;
        for owner in &owners {
            let mut mailbox = self.boxes.entry(*owner).or_default();
            if !contains(&mailbox.received, &envelope.eid) {
                mailbox.received.push(stored.clone());
                written += 1;
            }
        }

        let mut sender = self.boxes.entry(envelope.from_addr).or_default();
        if !contains(&sender.sent, &envelope.eid) {
            sender.sent.push(stored);
        }
        Ok(written)
    }
}

impl Default for MemoryMailStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailStore for MemoryMailStore {
    async fn store(&self, envelope: &CryptEnvelope) -> Result<usize, StorageError> {
        let encoded = envelope.packed()?.len();
        let size = i64::try_from(encoded)
            .map_err(|_| StorageError::Invalid(format!("envelope of {encoded} bytes")))?;

        let written = self.store_locked(envelope, size)?;
        debug!(
            "Store eid={} from={} recipients={} size={}",
            envelope.eid, envelope.from_addr, written, size
        );
        Ok(written)
    }

    async fn download(&self, owner: &Address, query: MailQuery) -> Result<Vec<CryptEnvelope>, StorageError> {
        debug!(
            "Download owner={} limit={} direction={:?} pivot={}",
            owner, query.limit, query.direction, query.pivot
        );

        let Some(mailbox) = self.boxes.get(owner) else {
            return Ok(Vec::new());
        };

        Ok(select(&mailbox, &query)
            .into_iter()
            .map(|m| CryptEnvelope::clone(&m.envelope))
            .collect())
    }

    async fn list(&self, owner: &Address, query: MailQuery) -> Result<Vec<ListEntry>, StorageError> {
        debug!(
            "List owner={} limit={} direction={:?} pivot={}",
            owner, query.limit, query.direction, query.pivot
        );

        let Some(mailbox) = self.boxes.get(owner) else {
            return Ok(Vec::new());
        };

        Ok(select(&mailbox, &query)
            .into_iter()
            .map(|m| ListEntry {
                eid: m.envelope.eid,
                date: m.envelope.date,
                size: u32::try_from(m.size).unwrap_or(u32::MAX),
            })
            .collect())
    }

    async fn delete(&self, owner: &Address, eids: &[Uuid]) -> Result<Vec<DeleteOutcome>, StorageError> {
        debug!("Delete owner={} count={}", owner, eids.len());

        let mut mailbox = self.boxes.get_mut(owner);
        let outcomes = eids
            .iter()
            .map(|eid| {
                let removed = match mailbox.as_mut() {
                    Some(mailbox) => {
                        let before = mailbox.received.len() + mailbox.sent.len();
                        mailbox.received.retain(|m| &m.envelope.eid != eid);
                        mailbox.sent.retain(|m| &m.envelope.eid != eid);
                        before != mailbox.received.len() + mailbox.sent.len()
                    }
                    None => false,
                };
                DeleteOutcome {
                    eid: *eid,
                    result: if removed {
                        DeleteResult::Deleted
                    } else {
                        DeleteResult::NotFound
                    },
                }
            })
            .collect();
        Ok(outcomes)
    }

    async fn state(&self, owner: &Address, before_time: i64) -> Result<StateAck, StorageError> {
        let state = match self.boxes.get(owner) {
            Some(mailbox) => StateAck {
                sent: stats(&mailbox.sent, self.quota, before_time),
                received: stats(&mailbox.received, self.quota, before_time),
            },
            None => StateAck {
                sent: stats(&[], self.quota, before_time),
                received: stats(&[], self.quota, before_time),
            },
        };
        debug!(
            "State owner={} sent={} received={}",
            owner, state.sent.total_count, state.received.total_count
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmail_crypto::{Identity, Iv};
    use bmail_wire::{Recipient, RecipientRole};

    fn envelope(from: &Address, to: &[Address], date: i64) -> CryptEnvelope {
        CryptEnvelope {
            eid: Uuid::new_v4(),
            from_name: "alice@example.bm".into(),
            from_addr: *from,
            recipients: to
                .iter()
                .map(|addr| Recipient {
                    display_name: "bob@example.bm".into(),
                    address: *addr,
                    role: RecipientRole::To,
                    sealed_key: vec![7u8; 64],
                })
                .collect(),
            date,
            session_id: String::new(),
            iv: Iv::random(),
            cipher_subject: vec![1u8; 32],
            cipher_body: vec![2u8; 128],
            cipher_attachments: vec![3u8; 36],
        }
    }

    fn older_than(limit: usize, pivot: i64) -> MailQuery {
        MailQuery {
            limit,
            direction: Direction::OlderThan,
            pivot,
            pivot_eid: None,
        }
    }

    #[tokio::test]
    async fn test_store_and_download() {
        let store = MemoryMailStore::new();
        let alice = Identity::generate().address();
        let bob = Identity::generate().address();

        let env = envelope(&alice, &[bob], 1_000);
        assert_eq!(store.store(&env).await.unwrap(), 1);

        let page = store.download(&bob, older_than(20, i64::MAX)).await.unwrap();
        assert_eq!(page, vec![env]);

        // The sender's received box stays empty
        assert!(store.download(&alice, older_than(20, i64::MAX)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pagination_has_no_overlap() {
        let store = MemoryMailStore::new();
        let alice = Identity::generate().address();
        let bob = Identity::generate().address();

        for i in 0..25 {
            store.store(&envelope(&alice, &[bob], 10_000 + i * 10)).await.unwrap();
        }

        let first = store.download(&bob, older_than(20, i64::MAX)).await.unwrap();
        assert_eq!(first.len(), 20);
        assert!(first.windows(2).all(|w| w[0].date > w[1].date));

        let oldest = first.last().unwrap().date;
        let second = store.download(&bob, older_than(20, oldest)).await.unwrap();
        assert_eq!(second.len(), 5);
        assert!(second.iter().all(|e| first.iter().all(|f| f.eid != e.eid)));

        let third = store
            .download(&bob, older_than(20, second.last().unwrap().date))
            .await
            .unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn test_equal_dates_page_by_eid() {
        let store = MemoryMailStore::new();
        let alice = Identity::generate().address();
        let bob = Identity::generate().address();

        for _ in 0..25 {
            store.store(&envelope(&alice, &[bob], 5_000)).await.unwrap();
        }

        let first = store.download(&bob, older_than(20, 5_001)).await.unwrap();
        assert_eq!(first.len(), 20);

        let last = first.last().unwrap();
        let cursor = MailQuery {
            pivot_eid: Some(last.eid),
            ..older_than(20, last.date)
        };
        let second = store.download(&bob, cursor).await.unwrap();
        assert_eq!(second.len(), 5);
        assert!(second.iter().all(|e| first.iter().all(|f| f.eid != e.eid)));

        let last = second.last().unwrap();
        let cursor = MailQuery {
            pivot_eid: Some(last.eid),
            ..older_than(20, last.date)
        };
        assert!(store.download(&bob, cursor).await.unwrap().is_empty());

        // Walking forward from the oldest visits the same envelopes
        let forward = MailQuery {
            limit: 100,
            direction: Direction::NewerThan,
            pivot: 5_000,
            pivot_eid: Some(last.eid),
        };
        assert_eq!(store.download(&bob, forward).await.unwrap().len(), 24);
    }

    #[tokio::test]
    async fn test_list_matches_download() {
        let store = MemoryMailStore::new();
        let alice = Identity::generate().address();
        let bob = Identity::generate().address();

        for date in [10, 20, 30] {
            store.store(&envelope(&alice, &[bob], date)).await.unwrap();
        }

        let entries = store.list(&bob, older_than(2, i64::MAX)).await.unwrap();
        let page = store.download(&bob, older_than(2, i64::MAX)).await.unwrap();
        assert_eq!(entries.len(), 2);
        for (entry, envelope) in entries.iter().zip(&page) {
            assert_eq!(entry.eid, envelope.eid);
            assert_eq!(entry.date, envelope.date);
            assert_eq!(entry.size as usize, envelope.packed().unwrap().len());
        }

        let stranger = Identity::generate().address();
        assert!(store.list(&stranger, older_than(2, i64::MAX)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_newer_than_walks_forward() {
        let store = MemoryMailStore::new();
        let alice = Identity::generate().address();
        let bob = Identity::generate().address();

        for date in [300, 100, 200, 400] {
            store.store(&envelope(&alice, &[bob], date)).await.unwrap();
        }

        let page = store
            .download(
                &bob,
                MailQuery {
                    limit: 2,
                    direction: Direction::NewerThan,
                    pivot: 100,
                    pivot_eid: None,
                },
            )
            .await
            .unwrap();
        let dates: Vec<_> = page.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![200, 300]);
    }

    #[tokio::test]
    async fn test_duplicate_recipients_get_one_copy() {
        let store = MemoryMailStore::new();
        let alice = Identity::generate().address();
        let bob = Identity::generate().address();

        let env = envelope(&alice, &[bob, bob], 5);
        assert_eq!(store.store(&env).await.unwrap(), 1);
        // Resubmitting the same envelope is idempotent
        assert_eq!(store.store(&env).await.unwrap(), 0);
        assert_eq!(store.download(&bob, older_than(20, i64::MAX)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryMailStore::new();
        let alice = Identity::generate().address();
        let bob = Identity::generate().address();

        let env = envelope(&alice, &[bob], 5);
        store.store(&env).await.unwrap();

        let missing = Uuid::new_v4();
        let outcomes = store.delete(&bob, &[env.eid, missing]).await.unwrap();
        assert_eq!(outcomes[0].result, DeleteResult::Deleted);
        assert_eq!(outcomes[1].result, DeleteResult::NotFound);
        assert!(store.download(&bob, older_than(20, i64::MAX)).await.unwrap().is_empty());

        // Sender's copy is independent
        let outcomes = store.delete(&alice, &[env.eid]).await.unwrap();
        assert_eq!(outcomes[0].result, DeleteResult::Deleted);

        let stranger = Identity::generate().address();
        let outcomes = store.delete(&stranger, &[env.eid]).await.unwrap();
        assert_eq!(outcomes[0].result, DeleteResult::NotFound);
    }

    #[tokio::test]
    async fn test_state_counts_both_boxes() {
        let store = MemoryMailStore::new();
        let alice = Identity::generate().address();
        let bob = Identity::generate().address();

        store.store(&envelope(&alice, &[bob], 10)).await.unwrap();
        store.store(&envelope(&alice, &[bob], 20)).await.unwrap();
        store.store(&envelope(&bob, &[alice], 30)).await.unwrap();

        let state = store.state(&bob, i64::MAX).await.unwrap();
        assert_eq!(state.received.total_count, 2);
        assert_eq!(state.sent.total_count, 1);
        assert!(state.received.used_size > 0);
        assert_eq!(state.received.total_space, DEFAULT_MAILBOX_QUOTA);

        let state = store.state(&bob, 15).await.unwrap();
        assert_eq!(state.received.total_count, 1);
        assert_eq!(state.sent.total_count, 0);

        let empty = store.state(&Identity::generate().address(), i64::MAX).await.unwrap();
        assert_eq!(empty.received.total_count, 0);
    }

    #[tokio::test]
    async fn test_quota_is_all_or_nothing() {
        let alice = Identity::generate().address();
        let bob = Identity::generate().address();
        let carol = Identity::generate().address();

        let size = envelope(&alice, &[bob], 0).packed().unwrap().len() as i64;
        let store = MemoryMailStore::with_quota(size * 2 + size / 2);

        // Fill bob's box so the next two-recipient envelope cannot fit
        store.store(&envelope(&alice, &[bob], 1)).await.unwrap();
        store.store(&envelope(&alice, &[bob], 2)).await.unwrap();

        let err = store.store(&envelope(&alice, &[carol, bob], 3)).await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded(addr) if addr == bob));
        assert!(store.download(&carol, older_than(20, i64::MAX)).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stores_respect_quota() {
        let alice = Identity::generate().address();
        let bob = Identity::generate().address();

        let envelopes: Vec<_> = (0..32).map(|i| envelope(&alice, &[bob], i)).collect();
        let size = envelopes[0].packed().unwrap().len() as i64;
        let store = Arc::new(MemoryMailStore::with_quota(size * 5));

        let tasks: Vec<_> = envelopes
            .into_iter()
            .map(|env| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.store(&env).await })
            })
            .collect();

        let mut accepted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(written) => accepted += written,
                Err(StorageError::QuotaExceeded(addr)) => assert_eq!(addr, bob),
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(accepted, 5);

        let state = store.state(&bob, i64::MAX).await.unwrap();
        assert_eq!(state.received.total_count, 5);
        assert!(state.received.used_size <= size * 5);
    }
}
