//! Sends a request once with a credential attached.

use problum_store::CredentialStore;
use problum_types::{ApiResponse, Credential, RequestSpec, Transport, traits::Result};
use std::sync::Arc;

/// Attaches a credential and performs exactly one round trip.
///
/// A 401 comes back as an ordinary [`ApiResponse`]; only a failed round trip is
/// an error. Deciding what a 401 means is up to the caller.
pub struct RequestDispatcher {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    base_url: String,
}

impl RequestDispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            store,
            base_url: base_url.into(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send with whatever credential is current.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`](problum_types::ClientError::Transport)
    /// if the round trip did not complete.
    pub async fn send(&self, spec: &RequestSpec) -> Result<ApiResponse> {
        let credential = self.store.get();
        self.send_with(spec, credential.as_ref()).await
    }

    /// Send with an explicit credential (or none).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`](problum_types::ClientError::Transport)
    /// if the round trip did not complete.
    pub async fn send_with(
        &self,
        spec: &RequestSpec,
        credential: Option<&Credential>,
    ) -> Result<ApiResponse> {
        let request = spec.to_outbound(&self.base_url, credential)?;
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            authenticated = credential.is_some(),
            "dispatching request"
        );

        let resp = self.transport.execute(request).await.inspect_err(|e| {
            tracing::warn!(method = %spec.method, path = %spec.path, error = %e, "request failed");
        })?;

        tracing::debug!(status = %resp.status, path = %spec.path, "response received");
        Ok(resp)
    }
}
