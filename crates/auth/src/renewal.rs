//! The credential renewal round trip.

use crate::session::TokenResponse;
use async_trait::async_trait;
use problum_types::{ClientError, Credential, RequestSpec, Transport, traits::Result};
use std::sync::Arc;

/// Exchanges ambient session proof for a new [`Credential`].
///
/// Any error is a failed renewal; implementations do not retry.
#[async_trait]
pub trait Renewer: Send + Sync {
    async fn renew(&self) -> Result<Credential>;
}

/// Calls the refresh endpoint through a [`Transport`].
///
/// The request carries no `Authorization` header. The refresh cookie set by
/// login travels in the transport's cookie jar.
pub struct HttpRenewer {
    transport: Arc<dyn Transport>,
    base_url: String,
    refresh_path: String,
}

impl HttpRenewer {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            refresh_path: refresh_path.into(),
        }
    }
}

#[async_trait]
impl Renewer for HttpRenewer {
    async fn renew(&self) -> Result<Credential> {
        let request =
            RequestSpec::post(self.refresh_path.as_str()).to_outbound(&self.base_url, None)?;
        let resp = self.transport.execute(request).await?;

        if !resp.is_success() {
            return Err(ClientError::RenewalFailed(format!(
                "refresh endpoint returned {}",
                resp.status
            )));
        }

        let body: TokenResponse = resp.json().map_err(|e| {
            ClientError::RenewalFailed(format!("failed to parse refresh response: {e}"))
        })?;
        body.into_credential()
            .ok_or_else(|| ClientError::RenewalFailed("no access token on refresh".into()))
    }
}
