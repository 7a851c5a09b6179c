//! Wallet Auth Server
//!
//! Challenge/response login for Ethereum-style wallets with cookie sessions
//! and user profiles.

use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;

use wallet_auth_server::app::build_app;
use wallet_auth_server::config::{Config, LogFormat};
use wallet_auth_server::db::Backends;
use wallet_auth_server::middleware::run_limiter_cleanup;
use wallet_auth_server::store::run_sweeper;

/// How often idle rate limiter buckets are dropped.
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    tracing::info!(
        environment = config.environment.as_str(),
        "Starting wallet auth server"
    );

    let backends = Backends::from_config(&config)
        .await
        .context("Failed to initialize storage backends")?;

    let app = build_app(&config, backends);

    let sweep_store = app.state.store.clone();
    let sweep_interval = config.store_sweep_interval();
    tokio::spawn(async move {
        tracing::info!("Session store sweeper started");
        run_sweeper(sweep_store, sweep_interval).await;
    });

    tokio::spawn(run_limiter_cleanup(
        app.request_limiter.clone(),
        LIMITER_CLEANUP_INTERVAL,
    ));
    tokio::spawn(run_limiter_cleanup(
        app.challenge_limiter.clone(),
        LIMITER_CLEANUP_INTERVAL,
    ));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app.router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_target(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .init(),
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
