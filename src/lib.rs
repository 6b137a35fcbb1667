//! # IAM Token Agent Library
//!
//! Turns a long-lived service-account key into short-lived IAM bearer
//! tokens, caches the current token behind a single-flight gate, persists
//! it across restarts and uses it to authorize completion requests.
//!
//! Modules:
//! - `credential`: key file loading and PS256 assertion signing
//! - `sources`: token endpoint exchange
//! - `cache`: the token, its freshness rule and the refresh gate
//! - `sinks`: durable dotenv-style token store
//! - `completion`: downstream completion client
//! - `server`: HTTP surface

pub mod cache;
pub mod completion;
pub mod config;
pub mod credential;
pub mod error;
pub mod helpers;
pub mod observability;
pub mod resilience;
pub mod server;
pub mod sinks;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::{Token, TokenCache};
pub use crate::config::service::ServiceConfig;
pub use crate::error::{AuthError, ConfigError, ExchangeError, PersistError, SigningError};

/// Production wiring: real token endpoint, dotenv-file persistence.
pub type IamTokenCache = TokenCache<sources::IamExchanger, sinks::EnvFileStore>;
