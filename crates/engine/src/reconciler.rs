//! The reconciliation algorithm.

use std::sync::Arc;

use linkwise_config::ReconcileConfig;
use linkwise_core::{
    ClusterView, Contact, ContactId, ContactStore, ContactTransaction, Error, Link, NewContact,
    Observation, Result, StoreError,
};
use tracing::{debug, error, info, warn};

use crate::locks::KeyLocks;

/// What one reconciliation did, along with the resulting cluster view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The consolidated cluster after the observation was applied.
    pub view: ClusterView,
    /// True when the observation matched nothing and started a new cluster.
    pub created: bool,
    /// The contact inserted by this call, primary or secondary.
    pub inserted: Option<ContactId>,
    /// Former primaries that were merged into the surviving one.
    pub demoted: Vec<ContactId>,
    /// Secondaries re-parented from a demoted primary onto the survivor.
    pub relinked: u64,
}

/// Applies observations to a [`ContactStore`].
///
/// One reconciler is shared by every caller in the process. Calls that touch
/// the same email or phone number are serialized through [`KeyLocks`]; the
/// store transaction covers everything else.
pub struct Reconciler {
    store: Arc<dyn ContactStore>,
    locks: KeyLocks,
    conflict_retries: u32,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self {
            store,
            locks: KeyLocks::new(),
            conflict_retries: ReconcileConfig::default().conflict_retries,
        }
    }

    pub fn from_config(store: Arc<dyn ContactStore>, config: &ReconcileConfig) -> Self {
        Self::new(store).with_conflict_retries(config.conflict_retries)
    }

    /// How many times a store conflict is retried with a fresh transaction.
    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub fn store(&self) -> &Arc<dyn ContactStore> {
        &self.store
    }

    /// Apply one observation and return the cluster it belongs to.
    pub async fn reconcile(&self, observation: Observation) -> Result<Reconciliation> {
        let _keys = self.locks.acquire(&observation.lock_keys()).await;

        let mut attempt = 0;
        loop {
            match self.try_reconcile(&observation).await {
                Ok(outcome) => return Ok(outcome),
                Err(StoreError::Conflict(reason)) if attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!(attempt, %reason, "Store conflict, retrying reconciliation");
                }
                Err(StoreError::NotFound(id)) => {
                    error!(%id, "Contact vanished mid-reconciliation; data is inconsistent");
                    return Err(Error::NotFound(id));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// One attempt inside one transaction. Dropping `tx` on any early return
    /// rolls the attempt back.
    async fn try_reconcile(
        &self,
        observation: &Observation,
    ) -> std::result::Result<Reconciliation, StoreError> {
        let email = observation.email();
        let phone = observation.phone_number();

        let mut tx = self.store.begin().await?;
        let matched = tx.find_by_email_or_phone(email, phone).await?;
        debug!(matched = matched.len(), "Looked up matching contacts");

        if matched.is_empty() {
            let contact = tx
                .insert(NewContact::primary(
                    email.map(str::to_owned),
                    phone.map(str::to_owned),
                ))
                .await?;
            tx.commit().await?;
            info!(primary_id = %contact.id, "Created new identity cluster");
            return Ok(Reconciliation {
                view: ClusterView::single(&contact),
                created: true,
                inserted: Some(contact.id),
                demoted: Vec::new(),
                relinked: 0,
            });
        }

        let (survivor, others) = select_roots(tx.as_mut(), &matched).await?;

        let new_email = email.is_some_and(|e| !matched.iter().any(|c| c.has_email(e)));
        let new_phone = phone.is_some_and(|p| !matched.iter().any(|c| c.has_phone(p)));
        let inserted = if new_email || new_phone {
            let contact = tx
                .insert(NewContact::secondary(
                    email.map(str::to_owned),
                    phone.map(str::to_owned),
                    survivor.id,
                ))
                .await?;
            info!(
                primary_id = %survivor.id,
                secondary_id = %contact.id,
                "Linked new contact information"
            );
            Some(contact.id)
        } else {
            None
        };

        let mut demoted = Vec::with_capacity(others.len());
        let mut relinked = 0;
        for other in others {
            tx.update_link(other.id, Link::Secondary { linked_id: survivor.id })
                .await?;
            let moved = tx.relink_secondaries(other.id, survivor.id).await?;
            info!(
                primary_id = %survivor.id,
                demoted_id = %other.id,
                relinked = moved,
                "Merged identity clusters"
            );
            relinked += moved;
            demoted.push(other.id);
        }

        let members = tx.find_cluster(survivor.id).await?;
        let primary = members
            .iter()
            .find(|c| c.id == survivor.id)
            .ok_or(StoreError::NotFound(survivor.id))?;
        let view = ClusterView::assemble(primary, &members);
        tx.commit().await?;

        Ok(Reconciliation {
            view,
            created: false,
            inserted,
            demoted,
            relinked,
        })
    }
}

/// Resolve matched contacts to their cluster roots and pick the oldest one.
///
/// Returns the surviving primary and the other roots (oldest first) that
/// must be merged into it.
async fn select_roots(
    tx: &mut dyn ContactTransaction,
    matched: &[Contact],
) -> std::result::Result<(Contact, Vec<Contact>), StoreError> {
    let mut root_ids: Vec<ContactId> = matched.iter().map(Contact::root_id).collect();
    root_ids.sort();
    root_ids.dedup();

    let mut roots = Vec::with_capacity(root_ids.len());
    for id in root_ids {
        match tx.get(id).await? {
            Some(root) if root.is_primary() => roots.push(root),
            Some(root) => warn!(
                %id,
                linked_id = ?root.link.linked_id(),
                "Cluster root is not a primary; ignoring it"
            ),
            None => error!(%id, "Secondary contact links to a missing primary"),
        }
    }
    roots.sort_by_key(Contact::age_key);

    if roots.is_empty() {
        let earliest = matched
            .iter()
            .min_by_key(|c| c.age_key())
            .ok_or_else(|| StoreError::QueryFailed("no matched contacts to resolve".into()))?;
        warn!(id = %earliest.id, "Repairing dangling secondary into a primary");
        tx.update_link(earliest.id, Link::Primary).await?;
        let repaired = Contact {
            link: Link::Primary,
            ..earliest.clone()
        };
        return Ok((repaired, Vec::new()));
    }

    let survivor = roots.remove(0);
    Ok((survivor, roots))
}
