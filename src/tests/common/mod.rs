// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::EncodingKey;
use reqwest::Client;

use crate::cache::{Token, TokenCache};
use crate::credential::{AssertionClaims, Credential};
use crate::credential::Assertion;
use crate::error::{ExchangeError, PersistError};
use crate::helpers::time::{from_unix, Clock};
use crate::sinks::TokenStore;
use crate::sources::ExchangeToken;

pub const TEST_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/service_account_key.pem");
pub const TEST_PUBLIC_KEY_PEM: &str = include_str!("../fixtures/service_account_key.pub.pem");
pub const TEST_AUDIENCE: &str = "https://iam.api.cloud.yandex.net/iam/v1/tokens";

pub fn test_credential() -> Credential {
    Credential::new("sa-1", "k-1", TEST_PRIVATE_KEY_PEM).expect("test key")
}

/// Credential holding an HMAC secret; PS256 refuses to sign with it.
pub fn unsignable_credential() -> Credential {
    Credential {
        service_account_id: "sa-1".to_owned(),
        key_id: "k-1".to_owned(),
        private_key: EncodingKey::from_secret(b"x"),
    }
}

pub fn write_key_file(dir: &Path, content: serde_json::Value) -> PathBuf {
    let path = dir.join("authorized_key.json");
    std::fs::write(&path, content.to_string()).expect("write key file");
    path
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn at(ts: i64) -> Arc<Self> {
        Arc::new(Self { now: AtomicI64::new(ts) })
    }

    pub fn set(&self, ts: i64) {
        self.now.store(ts, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        from_unix(self.now.load(Ordering::SeqCst))
    }
}

/// Token endpoint double: counts calls, records assertions, answers from a script.
#[derive(Debug)]
pub struct FakeExchanger {
    calls: AtomicUsize,
    delay: Duration,
    response: Mutex<Result<Token, ExchangeError>>,
    assertions: Mutex<Vec<AssertionClaims>>,
}

impl FakeExchanger {
    pub fn issuing(value: &str, expires_at: i64) -> Arc<Self> {
        Self::with_delay(value, expires_at, Duration::ZERO)
    }

    pub fn with_delay(value: &str, expires_at: i64, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            response: Mutex::new(Ok(Token::new(value.to_owned(), from_unix(expires_at)))),
            assertions: Mutex::new(Vec::new()),
        })
    }

    pub fn respond(&self, response: Result<Token, ExchangeError>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn issue(&self, value: &str, expires_at: i64) {
        self.respond(Ok(Token::new(value.to_owned(), from_unix(expires_at))));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn assertions(&self) -> Vec<AssertionClaims> {
        self.assertions.lock().unwrap().clone()
    }
}

impl ExchangeToken for Arc<FakeExchanger> {
    async fn exchange(&self, assertion: &Assertion) -> Result<Token, ExchangeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.assertions.lock().unwrap().push(assertion.claims.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response.lock().unwrap().clone()
    }
}

/// In-memory durable store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    token: Mutex<Option<Token>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn holding(value: &str, expires_at: i64) -> Arc<Self> {
        let store = Self::default();
        *store.token.lock().unwrap() = Some(Token::new(value.to_owned(), from_unix(expires_at)));
        Arc::new(store)
    }

    pub fn saved(&self) -> Option<Token> {
        self.token.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl TokenStore for Arc<MemoryStore> {
    async fn load(&self) -> Result<Option<Token>, PersistError> {
        Ok(self.saved())
    }

    async fn save(&self, token: &Token) -> Result<(), PersistError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.token.lock().unwrap() = Some(token.clone());
        Ok(())
    }
}

pub type TestCache = TokenCache<Arc<FakeExchanger>, Arc<MemoryStore>>;

/// Cache with the default five minute margin over test doubles.
pub fn test_cache(
    exchanger: &Arc<FakeExchanger>,
    store: &Arc<MemoryStore>,
    clock: Arc<dyn Clock>,
) -> TestCache {
    cache_with_credential(test_credential(), exchanger, store, clock)
}

pub fn cache_with_credential(
    credential: Credential,
    exchanger: &Arc<FakeExchanger>,
    store: &Arc<MemoryStore>,
    clock: Arc<dyn Clock>,
) -> TestCache {
    TokenCache::new(
        Arc::new(credential),
        TEST_AUDIENCE,
        Arc::clone(exchanger),
        Arc::clone(store),
        clock,
        TimeDelta::minutes(5),
    )
}

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}
