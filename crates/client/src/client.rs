//! The public request API: send, renew on 401, retry once.

use crate::{dispatcher::RequestDispatcher, transport::HttpTransport};
use problum_auth::{
    HttpRenewer, RefreshCoordinator, Renewer, SessionObserver,
    session::{self, LoginRequest, RegisterRequest},
};
use problum_config::{Config, EndpointsConfig};
use problum_store::CredentialStore;
use problum_types::{
    ApiResponse, ClientError, Credential, RequestSpec, Transport, traits::Result,
};
use std::sync::Arc;

/// Authenticated access to the platform API.
///
/// Owns one credential store and one refresh coordinator, so independent
/// clients never share a session. Clones share everything.
#[derive(Clone)]
pub struct AuthenticatedClient {
    dispatcher: Arc<RequestDispatcher>,
    coordinator: RefreshCoordinator,
    endpoints: EndpointsConfig,
}

impl AuthenticatedClient {
    /// Builds a client over reqwest with a cookie jar for the refresh cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP transport cannot be built from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_config(config)?);
        Ok(Self::new(transport, config))
    }

    /// Builds a client that renews through the configured refresh endpoint on
    /// the same transport.
    pub fn new(transport: Arc<dyn Transport>, config: &Config) -> Self {
        let renewer = Arc::new(HttpRenewer::new(
            Arc::clone(&transport),
            config.base_url.as_str(),
            config.endpoints.refresh.as_str(),
        ));
        Self::with_renewer(transport, renewer, config)
    }

    pub fn with_renewer(
        transport: Arc<dyn Transport>,
        renewer: Arc<dyn Renewer>,
        config: &Config,
    ) -> Self {
        let store = Arc::new(CredentialStore::new());
        Self {
            dispatcher: Arc::new(RequestDispatcher::new(
                transport,
                Arc::clone(&store),
                config.base_url.as_str(),
            )),
            coordinator: RefreshCoordinator::new(store, renewer),
            endpoints: config.endpoints.clone(),
        }
    }

    /// Register an observer that hears about session ends.
    pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) {
        self.coordinator.subscribe(observer);
    }

    #[must_use]
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    fn store(&self) -> &CredentialStore {
        self.coordinator.store()
    }

    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.store().get()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.store().is_present()
    }

    /// Install a credential obtained out of band, starting a new session.
    pub fn set_credential(&self, credential: Credential) {
        self.coordinator.begin_session(credential);
    }

    /// Send `spec`, renewing the credential and retrying once on 401.
    ///
    /// Any response other than 401 is returned unchanged, whatever its status.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Transport`] if a round trip did not complete.
    /// - [`ClientError::RenewalFailed`] if renewal failed or the renewed
    ///   credential was rejected as well. The store is empty afterwards.
    pub async fn request(&self, spec: RequestSpec) -> Result<ApiResponse> {
        let sent_with = self.store().get();
        let first = self.dispatcher.send_with(&spec, sent_with.as_ref()).await?;
        if !first.is_credential_rejected() {
            return Ok(first);
        }

        tracing::debug!(method = %spec.method, path = %spec.path, "credential rejected, renewing");
        let fresh = self.coordinator.acquire(sent_with.as_ref()).await?;

        let second = self.dispatcher.send_with(&spec, Some(&fresh)).await?;
        if second.is_credential_rejected() {
            tracing::warn!(
                method = %spec.method,
                path = %spec.path,
                "renewed credential rejected"
            );
            self.coordinator.end_session("renewed credential rejected");
            return Err(ClientError::RenewalFailed(
                "credential rejected after renewal".into(),
            ));
        }
        Ok(second)
    }

    /// Log in with a password; the returned credential becomes current.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Auth`] for bad credentials or a response without
    /// an access token.
    pub async fn login(&self, login: &str, password: &str) -> Result<()> {
        let spec = RequestSpec::post(self.endpoints.login.as_str())
            .json(&LoginRequest { login, password })?;
        let resp = self.dispatcher.send_with(&spec, None).await?;
        self.coordinator
            .begin_session(session::credential_from_response(resp)?);
        tracing::info!(login, "logged in");
        Ok(())
    }

    /// Create an account; the returned credential becomes current.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the server refuses the registration and
    /// [`ClientError::Auth`] if no access token comes back.
    pub async fn register(
        &self,
        login: &str,
        password: &str,
        repeated_password: &str,
    ) -> Result<()> {
        let spec = RequestSpec::post(self.endpoints.register.as_str()).json(&RegisterRequest {
            login,
            password,
            repeated_password,
        })?;
        let resp = self.dispatcher.send_with(&spec, None).await?;
        self.coordinator
            .begin_session(session::credential_from_response(resp)?);
        tracing::info!(login, "registered");
        Ok(())
    }

    /// Best-effort server logout, then drop the credential locally whatever
    /// the server said.
    ///
    /// A renewal still in flight completes for the requests waiting on it but
    /// does not put a credential back into the store.
    pub async fn logout(&self) {
        let spec = RequestSpec::post(self.endpoints.logout.as_str());
        match self.dispatcher.send(&spec).await {
            Ok(resp) if !resp.is_success() => {
                tracing::debug!(status = %resp.status, "server logout refused");
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "server logout failed"),
        }
        self.coordinator.close_session();
        tracing::info!("logged out");
    }

    /// Try to resume a session from the refresh cookie alone.
    ///
    /// Goes through the coordinator, so it joins a renewal already in flight.
    /// A failure notifies observers like any failed renewal.
    pub async fn restore_session(&self) -> bool {
        match self.coordinator.renew().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "no session to restore");
                false
            }
        }
    }
}
