//! Contact store traits: persistent storage of contact records.
//!
//! All reads and writes of a reconciliation go through one
//! [`ContactTransaction`]: nothing it writes is visible to anyone else until
//! [`ContactTransaction::commit`], and dropping it without committing rolls
//! everything back.
//!
//! Implementations: SQLite, PostgreSQL, in-memory (for testing).

use async_trait::async_trait;

use crate::contact::{Contact, ContactId, Link, NewContact};
use crate::error::StoreError;

/// A handle to contact storage. Cheap to share behind an `Arc`.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "postgres", "memory").
    fn name(&self) -> &str;

    /// Start a unit of work. A connection is held until commit or drop.
    async fn begin(&self) -> Result<Box<dyn ContactTransaction>, StoreError>;

    /// Every stored contact, oldest first. Administrative use only.
    async fn list_all(&self) -> Result<Vec<Contact>, StoreError>;

    /// Total number of stored contacts.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Cheap liveness check.
    async fn health_check(&self) -> Result<(), StoreError> {
        self.count().await.map(|_| ())
    }
}

/// One atomic read-decide-write sequence against the store.
///
/// Every list this trait returns is ordered oldest first: by creation
/// time, then id.
#[async_trait]
pub trait ContactTransaction: Send {
    /// Contacts whose email equals `email` OR whose phone equals `phone`.
    /// Absent arguments match nothing.
    async fn find_by_email_or_phone(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>, StoreError>;

    async fn get(&mut self, id: ContactId) -> Result<Option<Contact>, StoreError>;

    /// The primary `primary_id` plus every contact linked to it.
    async fn find_cluster(&mut self, primary_id: ContactId) -> Result<Vec<Contact>, StoreError>;

    /// Insert a contact. Fails with [`StoreError::Conflict`] when the same
    /// email/phone pair already exists.
    async fn insert(&mut self, contact: NewContact) -> Result<Contact, StoreError>;

    /// Set a contact's link. Idempotent; `updated_at` only moves when the
    /// link actually changes. Fails with [`StoreError::NotFound`] for an
    /// unknown id.
    async fn update_link(&mut self, id: ContactId, link: Link) -> Result<(), StoreError>;

    /// Re-point every contact linked to `from` at `to`. Returns how many
    /// contacts moved.
    async fn relink_secondaries(
        &mut self,
        from: ContactId,
        to: ContactId,
    ) -> Result<u64, StoreError>;

    /// Make every write of this transaction visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
