//! # FinTrack Worker
//!
//! Runs the periodic jobs:
//! - market refresh (hourly)
//! - log purge (daily)
//! - scraping-config check (every 6 hours)
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/fintrack cargo run -p fintrack-worker
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines.

use std::sync::Arc;
use std::time::Duration;

use fintrack_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    providers::{http_client, market::HttpMarketProvider},
};
use fintrack_worker::{
    config::WorkerConfig,
    jobs::{ConfigCheckJob, LogPurgeJob, MarketRefreshJob},
    scheduler::Scheduler,
    timeout::JobTimeout,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fintrack_worker=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Cancels `token` on Ctrl+C or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("FinTrack Worker v{} starting", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;

    let db_config = DatabaseConfig {
        max_connections: config.max_connections,
        ..DatabaseConfig::from_url(config.database_url.clone())
    };
    let pool = create_pool(db_config).await?;
    run_migrations(&pool).await?;

    let market = Arc::new(HttpMarketProvider::new(http_client(config.http_timeout)?));

    let mut scheduler = Scheduler::new(pool.clone(), JobTimeout::new(config.job_timeout));
    scheduler.register(Arc::new(ConfigCheckJob), config.config_check_interval);
    scheduler.register(
        Arc::new(MarketRefreshJob::new(market)),
        config.market_refresh_interval,
    );
    scheduler.register(
        Arc::new(LogPurgeJob::new(config.retention)),
        config.log_purge_interval,
    );

    tokio::spawn(cancel_on_signal(scheduler.shutdown_token()));

    scheduler.run().await;

    tokio::time::timeout(Duration::from_secs(5), close_pool(pool))
        .await
        .ok();
    tracing::info!("Worker stopped");

    Ok(())
}
