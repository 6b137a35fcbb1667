use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use iam_token_agent::completion::CompletionClient;
use iam_token_agent::credential::Credential;
use iam_token_agent::helpers::time::{get_token_safety_margin, SystemClock};
use iam_token_agent::observability::metrics::get_metrics;
use iam_token_agent::resilience::retry::RetrySettings;
use iam_token_agent::server;
use iam_token_agent::server::server::AppState;
use iam_token_agent::sinks::EnvFileStore;
use iam_token_agent::sources::IamExchanger;
use iam_token_agent::utils::config_loader;
use iam_token_agent::utils::logging::{self, LogLevel};
use iam_token_agent::IamTokenCache;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "iam-token-agent.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config)?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Load credential, fatal on any problem
    // -------------------------------

    let credential = Credential::load(Path::new(&service_config.credential.key_file))
        .await
        .inspect_err(|e| error!("cannot load service account key: {}", e))?;

    // -------------------------------
    // 3. Token cache, seeded from the durable store
    // -------------------------------

    let exchanger = IamExchanger::new(
        &service_config.credential.token_url,
        Duration::from_millis(service_config.credential.request_timeout_ms),
    )
    .context("failed to build token endpoint client")?;
    let audience = exchanger.audience().to_owned();
    let tokens: IamTokenCache = IamTokenCache::new(
        Arc::new(credential),
        audience,
        exchanger,
        EnvFileStore::new(&service_config.persistence.path),
        Arc::new(SystemClock),
        get_token_safety_margin(service_config.settings.safety_margin_seconds),
    );
    tokens.restore().await;

    // -------------------------------
    // 4. Keep the token warm in the background
    // -------------------------------

    let retry = RetrySettings::from(service_config.settings.retry.as_ref());
    let refresher = {
        let tokens = tokens.clone();
        tokio::spawn(async move { tokens.loop_refresh_token(&retry).await })
    };

    // -------------------------------
    // 5. Serve completion requests until SIGINT / SIGTERM
    // -------------------------------

    let completion = CompletionClient::new(&service_config.completion)
        .context("failed to build completion client")?;
    let state = AppState::new(get_metrics().await, tokens, completion);

    info!("Service starting...");
    server::server::start(&service_config.settings, state, shutdown_signal()).await?;

    refresher.abort();
    info!("Exiting application.");
    Ok(())
}

async fn shutdown_signal() {
    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        _ => {
            error!("cannot install signal handlers, falling back to ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT (Ctrl+C). Initiating graceful shutdown..."),
        _ = sigterm.recv() => info!("Received SIGTERM. Initiating graceful shutdown..."),
    }
}
