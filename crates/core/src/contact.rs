//! The contact record: the sole persisted entity.
//!
//! A contact carries an optional email and an optional phone number (set once,
//! never mutated) and a [`Link`] that places it in its identity cluster.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Database identifier of a contact. Monotonically increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(pub i64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The stored precedence column. Prefer [`Link`] in domain code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl LinkPrecedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPrecedence::Primary => "primary",
            LinkPrecedence::Secondary => "secondary",
        }
    }
}

impl fmt::Display for LinkPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkPrecedence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(LinkPrecedence::Primary),
            "secondary" => Ok(LinkPrecedence::Secondary),
            other => Err(format!("unknown link precedence '{other}'")),
        }
    }
}

/// Where a contact sits in its cluster.
///
/// A secondary always names its primary; a primary never has a linked id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Primary,
    Secondary { linked_id: ContactId },
}

impl Link {
    pub fn precedence(&self) -> LinkPrecedence {
        match self {
            Link::Primary => LinkPrecedence::Primary,
            Link::Secondary { .. } => LinkPrecedence::Secondary,
        }
    }

    pub fn linked_id(&self) -> Option<ContactId> {
        match self {
            Link::Primary => None,
            Link::Secondary { linked_id } => Some(*linked_id),
        }
    }

    /// Rebuild a link from its two stored columns.
    pub fn from_parts(
        precedence: LinkPrecedence,
        linked_id: Option<ContactId>,
    ) -> Result<Self, String> {
        match (precedence, linked_id) {
            (LinkPrecedence::Primary, None) => Ok(Link::Primary),
            (LinkPrecedence::Secondary, Some(linked_id)) => Ok(Link::Secondary { linked_id }),
            (LinkPrecedence::Primary, Some(id)) => {
                Err(format!("primary contact must not link to {id}"))
            }
            (LinkPrecedence::Secondary, None) => {
                Err("secondary contact is missing its linked id".into())
            }
        }
    }
}

/// A stored contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ContactRecord", try_from = "ContactRecord")]
pub struct Contact {
    pub id: ContactId,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub link: Link,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn is_primary(&self) -> bool {
        matches!(self.link, Link::Primary)
    }

    /// The primary this contact resolves to: itself, or its linked id.
    pub fn root_id(&self) -> ContactId {
        self.link.linked_id().unwrap_or(self.id)
    }

    /// Sort key for "age": creation time, then id.
    pub fn age_key(&self) -> (DateTime<Utc>, ContactId) {
        (self.created_at, self.id)
    }

    pub fn has_email(&self, email: &str) -> bool {
        self.email.as_deref() == Some(email)
    }

    pub fn has_phone(&self, phone: &str) -> bool {
        self.phone_number.as_deref() == Some(phone)
    }
}

/// A contact about to be inserted; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub link: Link,
}

impl NewContact {
    pub fn primary(email: Option<String>, phone_number: Option<String>) -> Self {
        Self {
            email,
            phone_number,
            link: Link::Primary,
        }
    }

    pub fn secondary(
        email: Option<String>,
        phone_number: Option<String>,
        linked_id: ContactId,
    ) -> Self {
        Self {
            email,
            phone_number,
            link: Link::Secondary { linked_id },
        }
    }
}

/// Wire shape of a contact: the link split back into its two columns.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContactRecord {
    id: ContactId,
    email: Option<String>,
    phone_number: Option<String>,
    linked_id: Option<ContactId>,
    link_precedence: LinkPrecedence,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Contact> for ContactRecord {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            email: c.email,
            phone_number: c.phone_number,
            linked_id: c.link.linked_id(),
            link_precedence: c.link.precedence(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

impl TryFrom<ContactRecord> for Contact {
    type Error = String;

    fn try_from(r: ContactRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            email: r.email,
            phone_number: r.phone_number,
            link: Link::from_parts(r.link_precedence, r.linked_id)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}
