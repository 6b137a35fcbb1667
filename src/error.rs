use std::path::PathBuf;

use thiserror::Error;

/// Max body chars carried by exchange/completion errors for diagnostics.
pub const BODY_SNIPPET_LIMIT: usize = 256;

/// Fatal startup problems with the service-account key file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read key file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("key file '{path}' is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("key file field '{0}' is missing or empty")]
    MissingField(&'static str),
    #[error("private key is not a valid RSA PEM: {0}")]
    InvalidKey(String),
}

/// Assertion could not be signed. Never retried.
#[derive(Debug, Clone, Error)]
pub enum SigningError {
    #[error("failed to sign assertion for audience '{audience}': {reason}")]
    Encode { audience: String, reason: String },
}

/// Token endpoint failure for a single exchange attempt.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    #[error("token endpoint unreachable: {0}")]
    Transport(String),
    #[error("token endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("token endpoint returned malformed body ({status}): {reason}; body: {body}")]
    Malformed {
        status: u16,
        body: String,
        reason: String,
    },
    #[error("issued token expires at {expires_at}, inside the freshness margin")]
    ShortLived { expires_at: String },
}

/// Failure of one refresh attempt, shared by every caller that joined it.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error("token refresh task aborted: {0}")]
    Aborted(String),
}

impl AuthError {
    /// Signing failures point at broken key material, everything else may pass on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AuthError::Signing(_))
    }
}

/// Durable token store failure.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("token store io error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Downstream completion request failure.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("completion endpoint unreachable: {0}")]
    Transport(String),
    #[error("completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response is malformed: {0}")]
    Malformed(String),
}

/// First `BODY_SNIPPET_LIMIT` chars of a response body for error reporting.
pub fn body_snippet(body: &str) -> String {
    match body.char_indices().nth(BODY_SNIPPET_LIMIT) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_owned(),
    }
}
