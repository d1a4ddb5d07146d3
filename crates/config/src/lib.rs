//! Configuration loading for the problum client.
//!
//! Uses figment: built-in defaults, then an optional YAML file, then
//! `PROBLUM_`-prefixed environment variables.

pub mod schema;

pub use schema::{Config, EndpointsConfig, LogConfig, LogFormat};
