//! Wire payloads of the session endpoints (login, register, refresh).

use problum_types::{ApiResponse, ClientError, Credential, traits::Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub login: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub login: &'a str,
    pub password: &'a str,
    pub repeated_password: &'a str,
}

/// Body shared by the login, register and refresh endpoints.
///
/// The refresh token itself travels only as an http-only cookie.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    /// Credential lifetime as reported by the server; informational only.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl TokenResponse {
    /// Extract the credential, treating an empty or missing token as absent.
    #[must_use]
    pub fn into_credential(self) -> Option<Credential> {
        self.access_token
            .filter(|t| !t.is_empty())
            .map(Credential::new)
    }
}

/// Parse a successful session-endpoint response into a [`Credential`].
///
/// # Errors
///
/// Returns [`ClientError::Http`] for non-2xx responses and
/// [`ClientError::Auth`] when the body carries no `access_token`.
pub fn credential_from_response(resp: ApiResponse) -> Result<Credential> {
    let resp = match resp.error_for_status() {
        Ok(r) => r,
        Err(ClientError::CredentialRejected) => {
            return Err(ClientError::Auth("invalid login or password".into()));
        }
        Err(e) => return Err(e),
    };
    let body: TokenResponse = resp
        .json()
        .map_err(|e| ClientError::Auth(format!("failed to parse token response: {e}")))?;
    tracing::debug!(expires_at = ?body.expires_at, "token response received");
    body.into_credential()
        .ok_or_else(|| ClientError::Auth("no access token in response".into()))
}
