//! Mailbox storage for bmail servers with pluggable backends.
//!
//! A server keeps two boxes per address: mail the address received and mail
//! it sent. Envelopes are stored sealed, exactly as they arrived.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;

use async_trait::async_trait;
use bmail_crypto::Address;
use bmail_wire::{CryptEnvelope, DeleteOutcome, Direction, ListEntry, StateAck, WireError};
use thiserror::Error;
use uuid::Uuid;

/// Default per-box quota reported in mailbox stats (1 GiB)
pub const DEFAULT_MAILBOX_QUOTA: i64 = 1 << 30;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Invalid operation
    #[error("Invalid operation: {0}")]
    Invalid(String),
    /// Mailbox has no room for the envelope
    #[error("Quota exceeded for {0}")]
    QuotaExceeded(Address),
    /// Envelope could not be measured or encoded
    #[error("Encoding error: {0}")]
    Wire(#[from] WireError),
}

/// One page request against an owner's received mail.
///
/// Received mail is ordered by `(date, eid)` and the page starts just past
/// the cursor `(pivot, pivot_eid)`. Without `pivot_eid` every envelope
/// dated exactly `pivot` is excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailQuery {
    /// Maximum number of envelopes to return
    pub limit: usize,
    /// Side of the pivot to walk
    pub direction: Direction,
    /// Milliseconds since the Unix epoch
    pub pivot: i64,
    /// Tie-break among envelopes dated exactly `pivot`
    pub pivot_eid: Option<Uuid>,
}

impl MailQuery {
    /// Whether an envelope with this date and id lies past the cursor
    pub fn admits(&self, date: i64, eid: &Uuid) -> bool {
        match (self.direction, &self.pivot_eid) {
            (Direction::OlderThan, None) => date < self.pivot,
            (Direction::OlderThan, Some(pivot_eid)) => (date, eid) < (self.pivot, pivot_eid),
            (Direction::NewerThan, None) => date > self.pivot,
            (Direction::NewerThan, Some(pivot_eid)) => (date, eid) > (self.pivot, pivot_eid),
        }
    }
}

/// Mail storage trait
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Store an envelope in every recipient's received box and the
    /// sender's sent box. Returns the number of received boxes written.
    ///
    /// Quota checks and writes of concurrent calls must not interleave.
    async fn store(&self, envelope: &CryptEnvelope) -> Result<usize, StorageError>;

    /// Page through `owner`'s received mail.
    ///
    /// `OlderThan` yields envelopes before the cursor, newest first;
    /// `NewerThan` yields those after it, oldest first.
    async fn download(&self, owner: &Address, query: MailQuery) -> Result<Vec<CryptEnvelope>, StorageError>;

    /// Same page as [`MailStore::download`], as ids, dates and sizes only
    async fn list(&self, owner: &Address, query: MailQuery) -> Result<Vec<ListEntry>, StorageError>;

    /// Delete envelopes from both of `owner`'s boxes
    async fn delete(&self, owner: &Address, eids: &[Uuid]) -> Result<Vec<DeleteOutcome>, StorageError>;

    /// Usage of `owner`'s boxes, counting envelopes dated before `before_time`
    async fn state(&self, owner: &Address, before_time: i64) -> Result<StateAck, StorageError>;
}

// Re-export backend implementations
pub use backend::mem::MemoryMailStore;
