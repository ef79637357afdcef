//! A syntactically validated email address.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Conventional `local@domain.tld` shape. Deliberately loose: deliverability
/// is proven by the confirmation link, not by the pattern.
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is a valid regex")
});

/// An email address that has passed the syntax check.
///
/// The only way to build one is [`Email::parse`] (or deserializing, which
/// goes through the same check via `try_from`), so any `Email` in the
/// system is known to be well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Validates `raw` and wraps it.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidEmail`] if the address doesn't match
    /// the `local@domain.tld` pattern.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        if EMAIL_PATTERN.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ProtocolError::InvalidEmail(raw.to_string()))
        }
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A log-safe rendering: the first five characters followed by `...`.
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(5).collect();
        format!("{prefix}...")
    }
}

impl TryFrom<String> for Email {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
