//! Unified error type for the problum workspace.

use thiserror::Error;

/// Enumerates all error kinds an API caller can observe.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never reached the server, or no response came back.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected the attached credential (HTTP 401).
    ///
    /// The authenticated client resolves this internally through credential
    /// renewal; callers only see it from helpers that classify a raw response.
    #[error("credential rejected by server")]
    CredentialRejected,

    /// Credential renewal failed, or the renewed credential was rejected too.
    ///
    /// Terminal: the session is over and the caller must authenticate again.
    #[error("not authenticated: {0}")]
    RenewalFailed(String),

    /// The server answered with a non-success status other than 401.
    #[error("http error: status={status}, body={body}")]
    Http { status: u16, body: String },

    /// Login or registration did not yield a credential.
    #[error("authentication error: {0}")]
    Auth(String),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Query-string encoding error.
    #[error("query encoding error: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),
}

// ── Feature-gated From impls ──────────────────────────────────────────────────

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl ClientError {
    /// Returns `true` if the error ends the authenticated session.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::RenewalFailed(_) | Self::CredentialRejected)
    }

    /// Returns `true` for failures where the request did not complete a
    /// round trip.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ClientError>;
