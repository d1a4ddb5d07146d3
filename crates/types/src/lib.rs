//! Core types and traits for the problum workspace.
//!
//! This crate defines the shared abstractions used across all layers of the
//! problum API client: the error taxonomy, the bearer credential, request and
//! response descriptions, platform resources, and the transport trait that the
//! HTTP layer implements.

pub mod credential;
pub mod error;
pub mod model;
pub mod request;
pub mod traits;

pub use credential::Credential;
pub use error::ClientError;
pub use model::{
    Attempt, AttemptStatus, Course, Difficulty, Lesson, Problem, SubmitResponse, Template,
    UserProfile,
};
pub use request::{ApiResponse, OutboundRequest, RequestSpec};
pub use traits::Transport;
