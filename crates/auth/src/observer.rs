//! Session lifecycle observers.

use problum_types::Credential;

/// Receives session lifecycle events from a client.
///
/// Observers run synchronously on the task that settles a renewal, before any
/// waiting request is released, so they must not block.
pub trait SessionObserver: Send + Sync {
    /// The session ended: renewal failed or a renewed credential was rejected.
    ///
    /// Called once per failed renewal cycle regardless of how many requests
    /// were waiting on it. Typical handlers drop cached application state and
    /// send the user back to login.
    fn on_renewal_failure(&self);

    /// A renewal cycle produced a new credential.
    fn on_renewed(&self, _credential: &Credential) {}
}

impl<F> SessionObserver for F
where
    F: Fn() + Send + Sync,
{
    fn on_renewal_failure(&self) {
        self();
    }
}
