//! In-memory credential holder backed by an `ArcSwapOption`.

use arc_swap::ArcSwapOption;
use problum_types::Credential;
use std::sync::Arc;

/// Holds the single current [`Credential`] of one client.
///
/// Reads are lock-free and always observe the most recent `set`/`clear`.
#[derive(Default)]
pub struct CredentialStore {
    current: ArcSwapOption<Credential>,
}

impl CredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current credential, if any.
    #[must_use]
    pub fn get(&self) -> Option<Credential> {
        self.current.load_full().map(|c| Credential::clone(&c))
    }

    /// Replaces the current credential.
    pub fn set(&self, credential: Credential) {
        tracing::debug!(credential = ?credential, "credential stored");
        self.current.store(Some(Arc::new(credential)));
    }

    /// Drops the current credential.
    pub fn clear(&self) {
        self.current.store(None);
    }

    /// Drops the current credential and returns it.
    ///
    /// Only one of several concurrent callers gets `Some`.
    pub fn take(&self) -> Option<Credential> {
        self.current
            .swap(None)
            .map(|c| Arc::try_unwrap(c).unwrap_or_else(|shared| Credential::clone(&shared)))
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.current.load().is_some()
    }
}
