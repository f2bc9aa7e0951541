//! Gatekeeper HTTP server.
//!
//! Serves the OAuth login, session and revocation endpoints. Storage is
//! picked from the environment:
//!
//! - `GATEKEEPER_REDIS_URL` set → OAuth state and sessions in Redis
//! - `DATABASE_URL` set → accounts in `PostgreSQL`
//! - otherwise in memory (single process only)

mod config;

use anyhow::Context;
use axum::{Extension, Router, routing::get};
use config::ServerConfig;
use gatekeeper_auth::stores::PostgresAccountRepository;
use gatekeeper_auth::{
    AccountRepository, AuthenticationService, GoogleIdentityProvider, MemoryAccountRepository,
    MemorySessionStore, MemoryStateRepository, RedisSessionStore, RedisStateRepository,
    SessionStore, StateRepository, Sweeper, SystemClock, auth_router,
};
use gatekeeper_web::{TrustForwardedHeaders, correlation_id_layer};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gatekeeper");

    // Load configuration
    let config = ServerConfig::from_env().context("Invalid configuration")?;
    info!(
        address = %config.bind_address(),
        redis = config.redis_url.is_some(),
        postgres = config.database_url.is_some(),
        "Configuration loaded"
    );

    let accounts = match &config.database_url {
        Some(url) => {
            info!("Connecting to account database...");
            let pool = sqlx::PgPool::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            let repository = PostgresAccountRepository::new(pool);
            repository.migrate().await.context("Failed to run migrations")?;
            info!("Account database ready");
            Accounts::Postgres(repository)
        }
        None => {
            warn!("DATABASE_URL not set, accounts are kept in memory");
            Accounts::Memory(MemoryAccountRepository::new())
        }
    };

    match &config.redis_url {
        Some(url) => {
            info!("Connecting to Redis...");
            let states = RedisStateRepository::new(url)
                .await
                .context("Failed to connect state repository to Redis")?;
            let sessions = RedisSessionStore::new(url)
                .await
                .context("Failed to connect session store to Redis")?;
            info!("Redis connected");
            match accounts {
                Accounts::Postgres(accounts) => run(&config, states, sessions, accounts).await,
                Accounts::Memory(accounts) => run(&config, states, sessions, accounts).await,
            }
        }
        None => {
            warn!("GATEKEEPER_REDIS_URL not set, OAuth state and sessions are kept in memory");
            let states = MemoryStateRepository::new();
            let sessions = MemorySessionStore::new();
            match accounts {
                Accounts::Postgres(accounts) => run(&config, states, sessions, accounts).await,
                Accounts::Memory(accounts) => run(&config, states, sessions, accounts).await,
            }
        }
    }
}

enum Accounts {
    Postgres(PostgresAccountRepository),
    Memory(MemoryAccountRepository),
}

/// Wire the service, start the sweeper and serve until shutdown.
async fn run<R, S, A>(
    config: &ServerConfig,
    states: R,
    sessions: S,
    accounts: A,
) -> anyhow::Result<()>
where
    R: StateRepository + 'static,
    S: SessionStore + 'static,
    A: AccountRepository + 'static,
{
    let service = Arc::new(
        AuthenticationService::new(
            &config.auth,
            states,
            sessions,
            accounts,
            GoogleIdentityProvider::new(config.auth.google.clone()),
            Arc::new(SystemClock),
        )
        .context("Failed to build authentication service")?,
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let sweeper = Sweeper::spawn(service.clone(), config.sweep_interval, shutdown_tx.subscribe());

    let mut app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(auth_router(service));
    if config.trust_forwarded {
        info!("Client IPs are read from forwarding headers");
        app = app.layer(Extension(TrustForwardedHeaders));
    }
    let app = app
        .layer(correlation_id_layer())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;
    info!(address = %config.bind_address(), "Server listening");

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = signal_tx.send(());
    });

    let mut server_shutdown = shutdown_tx.subscribe();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = server_shutdown.recv().await;
    })
    .await
    .context("Server error")?;

    if tokio::time::timeout(config.shutdown_timeout, sweeper.join())
        .await
        .is_err()
    {
        warn!("Sweeper did not stop within the shutdown timeout");
    }

    info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
