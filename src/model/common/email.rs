use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::str::FromStr;

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest address accepted, per RFC 5321 path limits.
pub const MAX_LENGTH: usize = 254;

/// A voter's email address, normalised so that it can be used as an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailError {
    #[error("Email address is required")]
    Empty,
    #[error("Email address must be at most {MAX_LENGTH} characters")]
    TooLong,
    #[error("'{0}' is not a valid email address")]
    Malformed(String),
}

impl Email {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Email {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = s.trim().to_lowercase();
        if address.is_empty() {
            return Err(EmailError::Empty);
        }
        if address.chars().count() > MAX_LENGTH {
            return Err(EmailError::TooLong);
        }

        let malformed = || EmailError::Malformed(s.trim().to_string());
        if address.chars().any(char::is_whitespace) {
            return Err(malformed());
        }
        let (local, domain) = address.rsplit_once('@').ok_or_else(malformed)?;
        if local.is_empty() || local.contains('@') {
            return Err(malformed());
        }
        // Require a dotted domain with no empty labels, e.g. `example.com`.
        let labels = domain.split('.').collect::<Vec<_>>();
        if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
            return Err(malformed());
        }

        Ok(Self(address))
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl From<Email> for Bson {
    fn from(email: Email) -> Self {
        Bson::String(email.0)
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Email {
        pub fn example() -> Self {
            "fan@example.com".parse().unwrap()
        }

        pub fn example2() -> Self {
            "supporter@example.org".parse().unwrap()
        }
    }
}
