//! Inbound observations: an email, a phone number, or both.
//!
//! An [`Observation`] can only be built with at least one field present, so
//! the reconciliation engine never sees an empty one. Format checks live in
//! [`ValidationRules`] and run at the boundary.

use regex_lite::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::error::{Error, Result};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.][^\s@]*\.[^\s@.]+$").expect("email pattern compiles")
});

/// A normalized email/phone pair with at least one field present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    email: Option<String>,
    phone_number: Option<String>,
}

impl Observation {
    /// Trim both fields, treat empty strings as absent, and reject an
    /// observation with nothing left.
    pub fn new(email: Option<String>, phone_number: Option<String>) -> Result<Self> {
        let email = normalize(email);
        let phone_number = normalize(phone_number);
        if email.is_none() && phone_number.is_none() {
            return Err(Error::Validation(
                "email or phoneNumber is required".into(),
            ));
        }
        Ok(Self {
            email,
            phone_number,
        })
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    /// Identity keys used for per-identity mutual exclusion, sorted.
    pub fn lock_keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(2);
        if let Some(email) = &self.email {
            keys.push(format!("email:{email}"));
        }
        if let Some(phone) = &self.phone_number {
            keys.push(format!("phone:{phone}"));
        }
        keys.sort();
        keys
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Format rules for inbound email and phone values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    pub min_phone_digits: usize,
    pub max_phone_digits: usize,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_phone_digits: 3,
            max_phone_digits: 15,
        }
    }
}

impl ValidationRules {
    /// Build an observation and check the format of every present field.
    pub fn observe(
        &self,
        email: Option<String>,
        phone_number: Option<String>,
    ) -> Result<Observation> {
        let observation = Observation::new(email, phone_number)?;
        if let Some(email) = observation.email() {
            self.check_email(email)?;
        }
        if let Some(phone) = observation.phone_number() {
            self.check_phone(phone)?;
        }
        Ok(observation)
    }

    pub fn check_email(&self, email: &str) -> Result<()> {
        if EMAIL_RE.is_match(email) {
            Ok(())
        } else {
            Err(Error::Validation(format!("'{email}' is not a valid email address")))
        }
    }

    pub fn check_phone(&self, phone: &str) -> Result<()> {
        if !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Validation(
                "phoneNumber must contain digits only".into(),
            ));
        }
        let digits = phone.len();
        if digits < self.min_phone_digits || digits > self.max_phone_digits {
            return Err(Error::Validation(format!(
                "phoneNumber must have between {} and {} digits",
                self.min_phone_digits, self.max_phone_digits
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_absent_is_rejected() {
        assert!(matches!(
            Observation::new(None, None),
            Err(Error::Validation(_))
        ));
        assert!(Observation::new(Some("  ".into()), Some(String::new())).is_err());
    }

    #[test]
    fn fields_are_trimmed() {
        let obs = Observation::new(Some(" a@x.com ".into()), None).unwrap();
        assert_eq!(obs.email(), Some("a@x.com"));
        assert_eq!(obs.phone_number(), None);
    }

    #[test]
    fn lock_keys_are_sorted_and_prefixed() {
        let obs = Observation::new(Some("a@x.com".into()), Some("111".into())).unwrap();
        assert_eq!(obs.lock_keys(), vec!["email:a@x.com", "phone:111"]);
        let phone_only = Observation::new(None, Some("111".into())).unwrap();
        assert_eq!(phone_only.lock_keys(), vec!["phone:111"]);
    }

    #[test]
    fn email_format() {
        let rules = ValidationRules::default();
        assert!(rules.check_email("a@x.com").is_ok());
        assert!(rules.check_email("first.last+tag@mail.example.org").is_ok());
        assert!(rules.check_email("no-at-sign.com").is_err());
        assert!(rules.check_email("a@nodot").is_err());
        assert!(rules.check_email("a b@x.com").is_err());
        assert!(rules.check_email("a@@x.com").is_err());
        assert!(rules.check_email("a@x.").is_err());
    }

    #[test]
    fn phone_format() {
        let rules = ValidationRules::default();
        assert!(rules.check_phone("111").is_ok());
        assert!(rules.check_phone("123456").is_ok());
        assert!(rules.check_phone("12").is_err());
        assert!(rules.check_phone("+1 555").is_err());
        assert!(rules.check_phone("1234567890123456").is_err());
    }

    #[test]
    fn observe_checks_every_present_field() {
        let rules = ValidationRules::default();
        assert!(rules.observe(Some("a@x.com".into()), Some("111".into())).is_ok());
        assert!(rules.observe(Some("a@x.com".into()), Some("abc".into())).is_err());
        assert!(rules.observe(Some("bad".into()), None).is_err());
        assert!(rules.observe(None, Some("".into())).is_err());
    }
}
