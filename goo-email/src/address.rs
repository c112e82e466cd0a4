use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pre-compiled address pattern (the one browsers use for `<input type="email">`).
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap()
});

/// An email address as entered by a visitor. Deserializing validates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid email address: {0}")]
pub struct InvalidEmail(pub String);

impl Email {
    /// Wrap an address without validating it.
    #[inline]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Wrap an address, returning `None` if it is not valid.
    pub fn parse(address: impl Into<String>) -> Option<Self> {
        let email = Self::new(address);
        email.is_valid().then_some(email)
    }

    pub fn is_valid(&self) -> bool {
        EMAIL_REGEX.is_match(&self.0)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = InvalidEmail;

    fn try_from(address: String) -> Result<Self, Self::Error> {
        if EMAIL_REGEX.is_match(&address) {
            Ok(Self(address))
        } else {
            Err(InvalidEmail(address))
        }
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}
