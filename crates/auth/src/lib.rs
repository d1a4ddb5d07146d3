//! Credential renewal for the problum client.
//!
//! The [`RefreshCoordinator`] guarantees a single renewal round trip at a
//! time and fans its outcome out to every request that needed it. The
//! [`Renewer`] trait is the renewal round trip itself; [`HttpRenewer`] calls
//! the refresh endpoint. [`SessionObserver`]s hear about session ends.

pub mod coordinator;
pub mod observer;
pub mod renewal;
pub mod session;

pub use coordinator::{RefreshCoordinator, RenewalPhase, Settlement};
pub use observer::SessionObserver;
pub use renewal::{HttpRenewer, Renewer};
