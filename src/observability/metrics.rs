use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub static OUTCOME_SUCCESS: &str = "success";
pub static OUTCOME_SIGNING_ERROR: &str = "signing_error";
pub static OUTCOME_EXCHANGE_ERROR: &str = "exchange_error";
pub static OUTCOME_AUTH_ERROR: &str = "auth_error";
pub static OUTCOME_ERROR: &str = "error";

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async {
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}


#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Refresh metrics
    pub token_refreshes: IntCounterVec,
    pub token_refresh_duration: HistogramVec,

    // Cache metrics
    pub cache_hits: IntCounter,
    pub token_expiry_unix: IntGauge,

    // Persistence
    pub persist_failures: IntCounter,

    // Downstream
    pub completion_requests: IntCounterVec,

    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("iamtokenagent".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            token_refreshes: IntCounterVec::new(Opts::new("token_refreshes_total", "Token refresh attempts by outcome"),&["outcome"],).unwrap(),
            token_refresh_duration: HistogramVec::new(HistogramOpts::new("token_refresh_duration_seconds", "Sign + exchange + persist duration").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["outcome"],).unwrap(),

            cache_hits: IntCounter::new("token_cache_hits_total", "Requests served from the cached token").unwrap(),
            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Expiry of the cached token").unwrap(),

            persist_failures: IntCounter::new("token_persist_failures_total", "Failed writes of the token to the durable store").unwrap(),

            completion_requests: IntCounterVec::new(Opts::new("completion_requests_total", "Completion requests by outcome"),&["outcome"],).unwrap(),

            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_refreshes.clone())).unwrap();
        reg.register(Box::new(metrics.token_refresh_duration.clone())).unwrap();
        reg.register(Box::new(metrics.cache_hits.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.persist_failures.clone())).unwrap();
        reg.register(Box::new(metrics.completion_requests.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
