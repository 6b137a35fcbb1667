use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::credential::key_file::Credential;
use crate::error::SigningError;
use crate::utils::constants::ASSERTION_TTL_SECONDS;

/// Claims of the identity assertion sent to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signed assertion in flight between signer and exchanger. Never persisted.
#[derive(Debug, Clone)]
pub struct Assertion {
    pub jwt: String,
    pub claims: AssertionClaims,
}

/// Build and sign a PS256 assertion. The key id travels in the header.
pub fn sign(
    credential: &Credential,
    audience: &str,
    now: DateTime<Utc>,
) -> Result<Assertion, SigningError> {
    let iat = now.timestamp();
    let claims = AssertionClaims {
        aud: audience.to_owned(),
        iss: credential.service_account_id.clone(),
        iat,
        exp: iat + ASSERTION_TTL_SECONDS,
    };

    let mut header = Header::new(Algorithm::PS256);
    header.kid = Some(credential.key_id.clone());

    let jwt = encode(&header, &claims, &credential.private_key).map_err(|e| {
        error!(audience = %audience, key_id = %credential.key_id, error = %e, "assertion signing failed");
        SigningError::Encode {
            audience: audience.to_owned(),
            reason: e.to_string(),
        }
    })?;

    debug!(audience = %audience, iat = claims.iat, exp = claims.exp, "assertion signed");
    Ok(Assertion { jwt, claims })
}
