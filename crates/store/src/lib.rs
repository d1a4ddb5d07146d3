//! Credential storage for the authenticated client.
//!
//! The current access credential lives only in memory; the long-lived session
//! proof is the refresh cookie held by the HTTP transport.

pub mod memory;

pub use memory::CredentialStore;
