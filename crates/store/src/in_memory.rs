//! In-memory store: useful for testing and ephemeral deployments.
//!
//! Transactions work on a private snapshot and validate at commit time:
//! if any contact the transaction looked at was changed (or a new contact
//! now matches one of its lookups) by a transaction that committed in the
//! meantime, the commit fails with [`StoreError::Conflict`].

use async_trait::async_trait;
use chrono::Utc;
use linkwise_core::{
    Contact, ContactId, ContactStore, ContactTransaction, Link, NewContact, StoreError,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type Table = BTreeMap<ContactId, Contact>;

#[derive(Default)]
struct Shared {
    contacts: Table,
    next_id: i64,
}

/// An in-memory contact store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Mutex<Shared>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Held only for short, non-async critical sections.
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn sorted(mut contacts: Vec<Contact>) -> Vec<Contact> {
    contacts.sort_by_key(|c| c.age_key());
    contacts
}

#[async_trait]
impl ContactStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn ContactTransaction>, StoreError> {
        let base = self.lock().contacts.clone();
        Ok(Box::new(InMemoryTransaction {
            store: self.clone(),
            working: base.clone(),
            base,
            reads: Vec::new(),
            inserted: Vec::new(),
        }))
    }

    async fn list_all(&self) -> Result<Vec<Contact>, StoreError> {
        Ok(sorted(self.lock().contacts.values().cloned().collect()))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.lock().contacts.len())
    }
}

/// Something a transaction observed; re-checked at commit.
#[derive(Debug, Clone)]
enum Read {
    Email(String),
    Phone(String),
    Id(ContactId),
    LinkedTo(ContactId),
}

impl Read {
    fn matches(&self, c: &Contact) -> bool {
        match self {
            Read::Email(email) => c.has_email(email),
            Read::Phone(phone) => c.has_phone(phone),
            Read::Id(id) => c.id == *id,
            Read::LinkedTo(id) => c.link.linked_id() == Some(*id),
        }
    }

    fn select<'a>(&self, table: &'a Table) -> Vec<&'a Contact> {
        table.values().filter(|c| self.matches(c)).collect()
    }
}

/// A snapshot transaction over an [`InMemoryStore`]. Dropping it discards
/// every write.
pub struct InMemoryTransaction {
    store: InMemoryStore,
    /// Committed state when the transaction began.
    base: Table,
    /// `base` plus this transaction's own writes.
    working: Table,
    reads: Vec<Read>,
    inserted: Vec<ContactId>,
}

impl InMemoryTransaction {
    fn select(&mut self, read: Read) -> Vec<Contact> {
        let found = read.select(&self.working).into_iter().cloned().collect();
        self.reads.push(read);
        sorted(found)
    }
}

#[async_trait]
impl ContactTransaction for InMemoryTransaction {
    async fn find_by_email_or_phone(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>, StoreError> {
        let mut found = Vec::new();
        if let Some(email) = email {
            found.extend(self.select(Read::Email(email.to_string())));
        }
        if let Some(phone) = phone {
            for c in self.select(Read::Phone(phone.to_string())) {
                if !found.iter().any(|f: &Contact| f.id == c.id) {
                    found.push(c);
                }
            }
        }
        Ok(sorted(found))
    }

    async fn get(&mut self, id: ContactId) -> Result<Option<Contact>, StoreError> {
        Ok(self.select(Read::Id(id)).pop())
    }

    async fn find_cluster(&mut self, primary_id: ContactId) -> Result<Vec<Contact>, StoreError> {
        let mut cluster = self.select(Read::Id(primary_id));
        cluster.extend(self.select(Read::LinkedTo(primary_id)));
        Ok(sorted(cluster))
    }

    async fn insert(&mut self, contact: NewContact) -> Result<Contact, StoreError> {
        let duplicate = self.working.values().any(|c| {
            c.email == contact.email && c.phone_number == contact.phone_number
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "contact ({:?}, {:?}) already exists",
                contact.email, contact.phone_number
            )));
        }

        let id = {
            let mut shared = self.store.lock();
            shared.next_id += 1;
            ContactId(shared.next_id)
        };
        let now = Utc::now();
        let created = Contact {
            id,
            email: contact.email,
            phone_number: contact.phone_number,
            link: contact.link,
            created_at: now,
            updated_at: now,
        };
        self.working.insert(id, created.clone());
        self.inserted.push(id);
        debug!(%id, precedence = %created.link.precedence(), "Inserted contact");
        Ok(created)
    }

    async fn update_link(&mut self, id: ContactId, link: Link) -> Result<(), StoreError> {
        self.reads.push(Read::Id(id));
        let contact = self.working.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if contact.link != link {
            contact.link = link;
            contact.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn relink_secondaries(
        &mut self,
        from: ContactId,
        to: ContactId,
    ) -> Result<u64, StoreError> {
        self.reads.push(Read::LinkedTo(from));
        let now = Utc::now();
        let mut moved = 0;
        for contact in self.working.values_mut() {
            if contact.link.linked_id() == Some(from) {
                contact.link = Link::Secondary { linked_id: to };
                contact.updated_at = now;
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction {
            store,
            base,
            working,
            reads,
            inserted,
        } = *self;

        let mut shared = store.lock();

        for read in &reads {
            if read.select(&shared.contacts) != read.select(&base) {
                return Err(StoreError::Conflict(format!(
                    "concurrent change to contacts matching {read:?}"
                )));
            }
        }

        for id in &inserted {
            let Some(new) = working.get(id) else { continue };
            let taken = shared.contacts.values().any(|c| {
                c.email == new.email && c.phone_number == new.phone_number
            });
            if taken {
                return Err(StoreError::Conflict(format!(
                    "contact ({:?}, {:?}) was inserted concurrently",
                    new.email, new.phone_number
                )));
            }
        }

        // Apply only what this transaction changed.
        for (id, contact) in working {
            if base.get(&id) != Some(&contact) {
                shared.contacts.insert(id, contact);
            }
        }
        Ok(())
    }
}
