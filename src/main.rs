use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use paygate::handlers::router;
use paygate::infrastructure::http_client::{ProcessorClient, build_http_client};
use paygate::infrastructure::memory_store::InMemoryPaymentStore;
use paygate::infrastructure::redis_client::RedisPaymentStore;
use paygate::ports::{PaymentProcessor, PaymentStore};
use paygate::{AppState, Config, ProcessorProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("invalid configuration")?;

    let http = build_http_client().context("failed to build http client")?;
    let default_processor: Arc<dyn PaymentProcessor> = Arc::new(
        ProcessorClient::new(
            http.clone(),
            &config.default_processor_url,
            ProcessorProvider::Default,
            config.timeouts,
        )
        .with_admin_token(config.processor_admin_token.clone()),
    );
    let fallback_processor: Arc<dyn PaymentProcessor> = Arc::new(
        ProcessorClient::new(
            http,
            &config.fallback_processor_url,
            ProcessorProvider::Fallback,
            config.timeouts,
        )
        .with_admin_token(config.processor_admin_token.clone()),
    );

    let store: Arc<dyn PaymentStore> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisPaymentStore::connect(url, config.record_ttl)
                .await
                .context("failed to connect to redis")?,
        ),
        None => {
            warn!("REDIS_URL not set, payments are kept in memory");
            Arc::new(InMemoryPaymentStore::new())
        }
    };

    let app_state = AppState::new(
        &config,
        Arc::clone(&default_processor),
        fallback_processor,
        store,
    );

    let cancel = CancellationToken::new();
    let monitor = app_state
        .health
        .spawn(default_processor, config.health_interval, cancel.clone());

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server_addr))?;

    info!(
        addr = %config.server_addr,
        max_workers = app_state.worker_pool.max_workers(),
        "service starting"
    );

    let worker_pool = app_state.worker_pool.clone();
    let payments = Arc::clone(&app_state.payments);
    axum::serve(listener, router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    cancel.cancel();

    worker_pool.close();
    worker_pool.wait().await;
    payments.flush().await;
    info!("all in-flight payments drained");

    if let Err(err) = monitor.await {
        warn!(error = %err, "health monitor ended abnormally");
    }
    info!("bye");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_ids(true)
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "error setting up ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "error setting up SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
