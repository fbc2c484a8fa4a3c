//! # FinTrack API Server
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/fintrack \
//! JWT_SECRET=... JWT_REFRESH_SECRET=... \
//! cargo run -p fintrack-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines.

use std::time::Duration;

use fintrack_api::{
    app::{build_router, AppState},
    config::Config,
    middleware::rate_limit::RateLimiter,
};
use fintrack_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fintrack_api=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
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
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("FinTrack API v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let db_config = DatabaseConfig {
        max_connections: config.database.max_connections,
        ..DatabaseConfig::from_url(config.database.url.clone())
    };
    let pool = create_pool(db_config).await?;
    run_migrations(&pool).await?;

    let mut state = AppState::from_config(pool.clone(), config.clone())?;

    if let Some(url) = config.redis_url.as_deref() {
        match RateLimiter::connect(url).await {
            Ok(limiter) => {
                tracing::info!("Rate limiter enabled");
                state = state.with_rate_limiter(limiter);
            }
            Err(e) => tracing::warn!(error = %e, "Redis unavailable, rate limiting disabled"),
        }
    }

    tracing::info!(
        payments = state.payments.is_some(),
        llm = state.llm.is_some(),
        "Providers configured"
    );

    let app = build_router(state);
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!("Listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tokio::time::timeout(Duration::from_secs(5), close_pool(pool))
        .await
        .ok();
    tracing::info!("Server stopped");

    Ok(())
}
