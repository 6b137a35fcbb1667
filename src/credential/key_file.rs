use std::fmt;
use std::path::Path;

use jsonwebtoken::EncodingKey;
use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;

static PEM_BEGIN: &str = "-----BEGIN";

/// Authorized key file as issued for a service account.
#[derive(Debug, Deserialize)]
struct KeyFile {
    #[serde(default)]
    id: String,
    #[serde(default)]
    service_account_id: String,
    #[serde(default)]
    private_key: String,
}

/// Immutable signing credential, loaded once per process.
pub struct Credential {
    pub service_account_id: String,
    pub key_id: String,
    pub(crate) private_key: EncodingKey,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("service_account_id", &self.service_account_id)
            .field("key_id", &self.key_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl Credential {
    pub fn new(
        service_account_id: impl Into<String>,
        key_id: impl Into<String>,
        private_key_pem: &str,
    ) -> Result<Self, ConfigError> {
        let service_account_id = service_account_id.into();
        let key_id = key_id.into();
        if service_account_id.trim().is_empty() {
            return Err(ConfigError::MissingField("service_account_id"));
        }
        if key_id.trim().is_empty() {
            return Err(ConfigError::MissingField("id"));
        }
        if private_key_pem.trim().is_empty() {
            return Err(ConfigError::MissingField("private_key"));
        }

        // key files may carry a banner line in front of the PEM block
        let pem = private_key_pem
            .find(PEM_BEGIN)
            .map(|start| &private_key_pem[start..])
            .ok_or_else(|| ConfigError::InvalidKey("no PEM block found".to_owned()))?;
        let private_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| ConfigError::InvalidKey(e.to_string()))?;

        Ok(Self {
            service_account_id,
            key_id,
            private_key,
        })
    }

    /// Read and validate the key file. Any failure is fatal to startup.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let key_file: KeyFile =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let credential = Self::new(
            key_file.service_account_id,
            key_file.id,
            &key_file.private_key,
        )?;
        info!(
            service_account_id = %credential.service_account_id,
            key_id = %credential.key_id,
            "service account credential loaded"
        );
        Ok(credential)
    }
}
