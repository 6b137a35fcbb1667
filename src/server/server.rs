use anyhow::Result;
use axum::routing::get;
use axum::Router;
use tracing::info;

use crate::cache::TokenCache;
use crate::completion::CompletionClient;
use crate::config::settings::SettingsConfig;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::server::completion_route;
use crate::sinks::TokenStore;
use crate::sources::ExchangeToken;

pub struct AppState<E, S> {
    pub metrics_state: MetricsState,
    pub tokens: TokenCache<E, S>,
    pub completion: CompletionClient,
}

impl<E, S> Clone for AppState<E, S> {
    fn clone(&self) -> Self {
        Self {
            metrics_state: self.metrics_state.clone(),
            tokens: self.tokens.clone(),
            completion: self.completion.clone(),
        }
    }
}

impl<E: ExchangeToken, S: TokenStore> AppState<E, S> {
    pub fn new(metrics: &Metrics, tokens: TokenCache<E, S>, completion: CompletionClient) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            tokens,
            completion,
        }
    }
}

pub fn router<E: ExchangeToken, S: TokenStore>(
    settings_config: &SettingsConfig,
    state: AppState<E, S>,
) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(state.metrics_state.router::<E, S>(&settings_config.metrics))
        .merge(completion_route::router::<E, S>())
        .with_state(state)
}

/// Serve the HTTP surface until `shutdown` resolves.
pub async fn start<E: ExchangeToken, S: TokenStore>(
    settings_config: &SettingsConfig,
    state: AppState<E, S>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let metrics = get_metrics().await;
    let app = router(settings_config, state);

    let bind_addr = &settings_config.server.host;
    let port = settings_config.server.port;
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_addr, port)).await?;
    info!("listening on {}:{}", bind_addr, port);

    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    metrics.up.set(0);

    Ok(())
}
