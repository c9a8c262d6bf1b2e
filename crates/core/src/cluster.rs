//! The consolidated view of one identity cluster.

use serde::{Deserialize, Serialize};

use crate::contact::{Contact, ContactId};

/// A cluster presented as a single logical identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterView {
    pub primary_contact_id: ContactId,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_contact_ids: Vec<ContactId>,
}

impl ClusterView {
    /// View of a cluster that consists of a single primary.
    pub fn single(primary: &Contact) -> Self {
        Self::assemble(primary, std::slice::from_ref(primary))
    }

    /// Build the view from a cluster's primary and its members.
    ///
    /// `members` may or may not include the primary itself and may be in any
    /// order. The primary's own email/phone come first, then the distinct
    /// values of the secondaries ordered by creation time (ties by id).
    pub fn assemble(primary: &Contact, members: &[Contact]) -> Self {
        let mut secondaries: Vec<&Contact> =
            members.iter().filter(|c| c.id != primary.id).collect();
        secondaries.sort_by_key(|c| c.age_key());

        let ordered = || std::iter::once(primary).chain(secondaries.iter().copied());

        Self {
            primary_contact_id: primary.id,
            emails: distinct(ordered().filter_map(|c| c.email.as_deref())),
            phone_numbers: distinct(ordered().filter_map(|c| c.phone_number.as_deref())),
            secondary_contact_ids: secondaries.iter().map(|c| c.id).collect(),
        }
    }
}

/// First-occurrence dedup that keeps input order.
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.iter().any(|seen| seen == value) {
            out.push(value.to_string());
        }
    }
    out
}

/// Response envelope of the identify operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyResponse {
    pub contact: ClusterView,
}

impl From<ClusterView> for IdentifyResponse {
    fn from(contact: ClusterView) -> Self {
        Self { contact }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::Link;
    use chrono::{Duration, TimeZone, Utc};

    fn at(id: i64, minute: i64, email: Option<&str>, phone: Option<&str>, link: Link) -> Contact {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        Contact {
            id: ContactId(id),
            email: email.map(String::from),
            phone_number: phone.map(String::from),
            link,
            created_at: ts,
            updated_at: ts,
        }
    }

    fn under(id: i64) -> Link {
        Link::Secondary {
            linked_id: ContactId(id),
        }
    }

    #[test]
    fn single_primary_view() {
        let p = at(1, 0, Some("a@x.com"), None, Link::Primary);
        let view = ClusterView::single(&p);
        assert_eq!(view.primary_contact_id, ContactId(1));
        assert_eq!(view.emails, vec!["a@x.com"]);
        assert!(view.phone_numbers.is_empty());
        assert!(view.secondary_contact_ids.is_empty());
    }

    #[test]
    fn primary_fields_come_first_even_when_younger_secondaries_sort_earlier() {
        // A demoted older-looking row can't outrank the primary's own values.
        let p = at(5, 10, Some("p@x.com"), Some("999"), Link::Primary);
        let s1 = at(2, 0, Some("s@x.com"), Some("111"), under(5));
        let s2 = at(7, 20, None, Some("222"), under(5));

        let view = ClusterView::assemble(&p, &[s2.clone(), p.clone(), s1.clone()]);
        assert_eq!(view.emails, vec!["p@x.com", "s@x.com"]);
        assert_eq!(view.phone_numbers, vec!["999", "111", "222"]);
        assert_eq!(view.secondary_contact_ids, vec![ContactId(2), ContactId(7)]);
    }

    #[test]
    fn duplicates_collapse_to_first_occurrence() {
        let p = at(1, 0, Some("a@x.com"), Some("111"), Link::Primary);
        let s1 = at(2, 1, Some("a@x.com"), Some("222"), under(1));
        let s2 = at(3, 2, Some("b@y.com"), Some("222"), under(1));

        let view = ClusterView::assemble(&p, &[p.clone(), s1, s2]);
        assert_eq!(view.emails, vec!["a@x.com", "b@y.com"]);
        assert_eq!(view.phone_numbers, vec!["111", "222"]);
        assert_eq!(view.secondary_contact_ids, vec![ContactId(2), ContactId(3)]);
    }

    #[test]
    fn primary_without_email_lists_secondary_emails_only() {
        let p = at(1, 0, None, Some("111"), Link::Primary);
        let s = at(2, 1, Some("a@x.com"), None, under(1));
        let view = ClusterView::assemble(&p, &[p.clone(), s]);
        assert_eq!(view.emails, vec!["a@x.com"]);
        assert_eq!(view.phone_numbers, vec!["111"]);
    }

    #[test]
    fn same_timestamp_ties_break_on_id() {
        let p = at(1, 0, Some("a@x.com"), None, Link::Primary);
        let s3 = at(3, 5, Some("c@x.com"), None, under(1));
        let s2 = at(2, 5, Some("b@x.com"), None, under(1));
        let view = ClusterView::assemble(&p, &[s3, s2]);
        assert_eq!(view.emails, vec!["a@x.com", "b@x.com", "c@x.com"]);
        assert_eq!(view.secondary_contact_ids, vec![ContactId(2), ContactId(3)]);
    }

    #[test]
    fn response_envelope_uses_camel_case() {
        let p = at(1, 0, Some("a@x.com"), Some("111"), Link::Primary);
        let json = serde_json::to_value(IdentifyResponse::from(ClusterView::single(&p))).unwrap();
        assert_eq!(json["contact"]["primaryContactId"], 1);
        assert_eq!(json["contact"]["emails"][0], "a@x.com");
        assert_eq!(json["contact"]["phoneNumbers"][0], "111");
        assert_eq!(json["contact"]["secondaryContactIds"], serde_json::json!([]));
    }
}
