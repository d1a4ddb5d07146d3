//! Async traits shared across all problum crates.
//!
//! Every cross-crate abstraction is defined here so that higher layers depend
//! only on `problum-types`, not on each other.

use crate::{ApiResponse, OutboundRequest};
use async_trait::async_trait;

pub use crate::error::Result;

/// Performs exactly one HTTP round trip.
///
/// Implementations carry the ambient session proof (the refresh cookie) in
/// their own cookie jar. They never retry and never interpret status codes:
/// any response that came back is `Ok`, and only a failure to complete the
/// round trip is [`ClientError::Transport`](crate::ClientError::Transport).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: OutboundRequest) -> Result<ApiResponse>;
}
