use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::cache::token::Token;
use crate::error::PersistError;
use crate::sinks::env_map::EnvMap;
use crate::utils::constants::{IAM_TOKEN_EXPIRES_KEY, IAM_TOKEN_KEY};

/// Durable mirror of the cached token.
pub trait TokenStore: Send + Sync + 'static {
    fn load(&self) -> impl Future<Output = Result<Option<Token>, PersistError>> + Send;
    fn save(&self, token: &Token) -> impl Future<Output = Result<(), PersistError>> + Send;
}

/// Token persisted as two keys of a dotenv file shared with other settings.
#[derive(Debug, Clone)]
pub struct EnvFileStore {
    path: PathBuf,
}

impl EnvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<EnvMap, PersistError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(EnvMap::parse(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(EnvMap::default()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    /// tmp -> fsync -> rename -> fsync dir, so the target is never left truncated
    async fn write_atomic(&self, content: &str) -> Result<(), PersistError> {
        let tmp = tmp_path(&self.path);
        if let Err(e) = self.write_synced(&tmp, content).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(self.io_error(e));
        }

        #[cfg(unix)]
        {
            let dir = match self.path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let dir = File::open(dir).await.map_err(|e| self.io_error(e))?;
            dir.sync_all().await.map_err(|e| self.io_error(e))?;
        }
        Ok(())
    }

    async fn write_synced(&self, tmp: &Path, content: &str) -> Result<(), PersistError> {
        let mut opts = OpenOptions::new();
        opts.create(true).write(true).truncate(true);
        #[cfg(unix)]
        opts.mode(0o600);

        let mut file = opts.open(tmp).await.map_err(|e| self.io_error(e))?;

        // mode() only applies on create; a leftover tmp keeps its old bits
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| self.io_error(e))?;
        }

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.sync_all().await.map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> PersistError {
        PersistError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenStore for EnvFileStore {
    async fn load(&self) -> Result<Option<Token>, PersistError> {
        let map = self.read_map().await?;

        let value = match map.get(IAM_TOKEN_KEY).filter(|v| !v.is_empty()) {
            Some(value) => value,
            None => return Ok(None),
        };
        let expires_raw = match map.get(IAM_TOKEN_EXPIRES_KEY) {
            Some(raw) => raw,
            None => {
                warn!(path = %self.path.display(), "persisted token has no expiry, ignoring it");
                return Ok(None);
            }
        };
        match DateTime::parse_from_rfc3339(&expires_raw) {
            Ok(expires_at) => Ok(Some(Token::new(value, expires_at.with_timezone(&Utc)))),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "persisted token expiry is unreadable, ignoring it");
                Ok(None)
            }
        }
    }

    async fn save(&self, token: &Token) -> Result<(), PersistError> {
        let mut map = self.read_map().await?;
        map.set(IAM_TOKEN_KEY, &token.value);
        map.set(
            IAM_TOKEN_EXPIRES_KEY,
            &token.expires_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        );
        self.write_atomic(&map.render()).await?;

        info!(path = %self.path.display(), expires_at = %token.expires_at, "IAM token persisted");
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
