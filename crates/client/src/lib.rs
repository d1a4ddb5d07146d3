//! Authenticated HTTP client for the problum learning platform.
//!
//! [`AuthenticatedClient`] sends every request with the current bearer
//! credential. On a 401 it renews the credential through a single-flight
//! [`RefreshCoordinator`](problum_auth::RefreshCoordinator) and retries once.
//! [`LearningApi`] layers the typed course/lesson/problem endpoints on top.

pub mod api;
pub mod client;
pub mod dispatcher;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use api::LearningApi;
pub use client::AuthenticatedClient;
pub use dispatcher::RequestDispatcher;
pub use transport::HttpTransport;
