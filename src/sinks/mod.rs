//! Durable sinks for the cached token.

pub mod env_map;
pub mod sink_file;

pub use sink_file::{EnvFileStore, TokenStore};
