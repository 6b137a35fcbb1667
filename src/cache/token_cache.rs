use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::cache::token::Token;
use crate::credential::{sign, Credential};
use crate::error::{AuthError, ExchangeError};
use crate::helpers::time::Clock;
use crate::observability::metrics::{
    get_metrics, OUTCOME_EXCHANGE_ERROR, OUTCOME_SIGNING_ERROR, OUTCOME_SUCCESS,
};
use crate::sinks::TokenStore;
use crate::sources::ExchangeToken;

type SharedRefresh = Shared<BoxFuture<'static, Result<Token, AuthError>>>;

#[derive(Default)]
struct CacheState {
    token: Option<Token>,
    /// In-flight refresh every stale caller joins.
    pending: Option<SharedRefresh>,
}

struct Inner<E, S> {
    credential: Arc<Credential>,
    audience: String,
    exchanger: E,
    store: S,
    clock: Arc<dyn Clock>,
    margin: TimeDelta,
    state: Mutex<CacheState>,
}

/// Owner of the single bearer token of the process.
///
/// Every read and write of the token goes through this type. Stale callers
/// share one sign + exchange + persist run; the run lives in its own task, so
/// callers that give up do not cancel it for the others.
pub struct TokenCache<E, S> {
    inner: Arc<Inner<E, S>>,
}

impl<E, S> Clone for TokenCache<E, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: ExchangeToken, S: TokenStore> TokenCache<E, S> {
    pub fn new(
        credential: Arc<Credential>,
        audience: impl Into<String>,
        exchanger: E,
        store: S,
        clock: Arc<dyn Clock>,
        margin: TimeDelta,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                credential,
                audience: audience.into(),
                exchanger,
                store,
                clock,
                margin,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Seed the cache from the durable store. Meant to run once at startup.
    ///
    /// Returns `true` when a persisted token was picked up. A stale persisted
    /// token is kept too; the first caller simply refreshes it.
    pub async fn restore(&self) -> bool {
        match self.inner.store.load().await {
            Ok(Some(token)) => {
                let fresh = token.is_fresh(self.inner.clock.now(), self.inner.margin);
                info!(expires_at = %token.expires_at, fresh, "restored persisted IAM token");
                get_metrics().await.token_expiry_unix.set(token.expires_at.timestamp());
                self.inner.state.lock().await.token = Some(token);
                true
            }
            Ok(None) => {
                debug!("no persisted IAM token");
                false
            }
            Err(e) => {
                warn!(error = %e, "cannot read persisted IAM token, starting empty");
                false
            }
        }
    }

    /// Current token if it is usable, otherwise the result of a shared refresh.
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        let metrics = get_metrics().await;
        let refresh = {
            let mut state = self.inner.state.lock().await;
            let now = self.inner.clock.now();
            if let Some(token) = state
                .token
                .as_ref()
                .filter(|t| t.is_fresh(now, self.inner.margin))
            {
                metrics.cache_hits.inc();
                return Ok(token.value.clone());
            }

            match state.pending.clone() {
                Some(pending) => {
                    debug!("joining in-flight IAM token refresh");
                    pending
                }
                None => {
                    let pending = self.start_refresh();
                    state.pending = Some(pending.clone());
                    pending
                }
            }
        };

        refresh.await.map(|token| token.value)
    }

    /// When the cached token stops being served, if there is one.
    pub async fn refresh_due_at(&self) -> Option<DateTime<Utc>> {
        self.inner
            .state
            .lock()
            .await
            .token
            .as_ref()
            .map(|t| t.refresh_at(self.inner.margin))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    fn start_refresh(&self) -> SharedRefresh {
        info!(audience = %self.inner.audience, "IAM token is stale, refreshing");
        let handle = tokio::spawn(Arc::clone(&self.inner).refresh());
        let inner = Arc::clone(&self.inner);
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "IAM token refresh task died");
                    inner.state.lock().await.pending = None;
                    Err(AuthError::Aborted(e.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl<E: ExchangeToken, S: TokenStore> Inner<E, S> {
    async fn refresh(self: Arc<Self>) -> Result<Token, AuthError> {
        let metrics = get_metrics().await;
        let start = Instant::now();

        let result = self.sign_and_exchange().await;
        if let Ok(token) = &result {
            // write through before any waiter sees the token
            if let Err(e) = self.store.save(token).await {
                error!(error = %e, "failed to persist IAM token");
                metrics.persist_failures.inc();
            }
        }

        let outcome = match &result {
            Ok(_) => OUTCOME_SUCCESS,
            Err(AuthError::Signing(_)) => OUTCOME_SIGNING_ERROR,
            Err(_) => OUTCOME_EXCHANGE_ERROR,
        };
        metrics.token_refreshes.with_label_values(&[outcome]).inc();
        metrics
            .token_refresh_duration
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        let mut state = self.state.lock().await;
        match &result {
            Ok(token) => {
                info!(expires_at = %token.expires_at, "IAM token refreshed");
                metrics.token_expiry_unix.set(token.expires_at.timestamp());
                state.token = Some(token.clone());
            }
            Err(e) => {
                error!(audience = %self.audience, error = %e, "IAM token refresh failed");
            }
        }
        state.pending = None;
        result
    }

    async fn sign_and_exchange(&self) -> Result<Token, AuthError> {
        let assertion = sign(&self.credential, &self.audience, self.clock.now())?;
        let token = self.exchanger.exchange(&assertion).await?;

        if !token.is_fresh(self.clock.now(), self.margin) {
            return Err(ExchangeError::ShortLived {
                expires_at: token.expires_at.to_rfc3339(),
            }
            .into());
        }
        Ok(token)
    }
}
