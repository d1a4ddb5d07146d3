//! Bearer credential representation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque short-lived bearer token.
///
/// Expiry is enforced by the server and never decoded client-side. Two
/// credentials are equal when their token strings are equal, which is how a
/// caller tells whether the credential it sent is still the current one.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only a short prefix of a long token reaches logs.
        if self.0.chars().count() <= 8 {
            return f.write_str("Credential(…)");
        }
        let prefix: String = self.0.chars().take(4).collect();
        write!(f, "Credential({prefix}…)")
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Credential {
    fn from(s: String) -> Self {
        Self(s)
    }
}
