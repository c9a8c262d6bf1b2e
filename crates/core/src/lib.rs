//! # Linkwise Core
//!
//! Domain types, traits, and error definitions for the Linkwise identity
//! reconciliation service. This crate has **no framework dependencies**: it
//! defines the contact model that every other crate implements against.
//!
//! ## Layout
//!
//! - [`contact`]: the `Contact` record and its two-state [`Link`]
//! - [`cluster`]: the consolidated [`ClusterView`] presented to callers
//! - [`observation`]: validated inbound email/phone pairs
//! - [`store`]: the `ContactStore` / `ContactTransaction` traits
//! - [`error`]: the closed error taxonomy
//!
//! Storage backends live in `linkwise-store`, the matching and merge
//! algorithm in `linkwise-engine`.

pub mod error;
pub mod contact;
pub mod cluster;
pub mod observation;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ErrorClass, Result, StoreError};
pub use contact::{Contact, ContactId, Link, LinkPrecedence, NewContact};
pub use cluster::{ClusterView, IdentifyResponse};
pub use observation::{Observation, ValidationRules};
pub use store::{ContactStore, ContactTransaction};
