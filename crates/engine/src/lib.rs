//! Linkwise reconciliation engine.
//!
//! Turns a stream of `(email, phone)` observations into identity clusters:
//! every observation either starts a new cluster, adds a secondary contact to
//! an existing one, or merges clusters that turn out to describe the same
//! person.
//!
//! ```no_run
//! # async fn example() -> linkwise_core::Result<()> {
//! use std::sync::Arc;
//! use linkwise_core::Observation;
//! use linkwise_engine::Reconciler;
//!
//! # let store: Arc<dyn linkwise_core::ContactStore> = unimplemented!();
//! let reconciler = Reconciler::new(store);
//! let outcome = reconciler
//!     .reconcile(Observation::new(Some("doc@hillvalley.edu".into()), None)?)
//!     .await?;
//! println!("primary = {}", outcome.view.primary_contact_id);
//! # Ok(())
//! # }
//! ```

pub mod locks;
pub mod reconciler;

pub use locks::{KeyGuard, KeyLocks};
pub use reconciler::{Reconciler, Reconciliation};
