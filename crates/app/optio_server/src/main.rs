//! Optio API server binary.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use optio_api::config::ApiConfig;
use optio_core::auth::{AuthConfig, AuthError, SigningSecret};
use optio_core::store::{MemoryStore, PgStore, Store};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "optio_server", about = "Optio API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL", required_unless_present = "in_memory")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 20)]
    max_connections: u32,

    /// Access token signing secret.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    #[arg(long, env = "JWT_ISSUER", default_value = optio_core::auth::config::DEFAULT_ISSUER)]
    jwt_issuer: String,

    #[arg(long, env = "JWT_AUDIENCE", default_value = optio_core::auth::config::DEFAULT_AUDIENCE)]
    jwt_audience: String,

    #[arg(long, env = "ACCESS_TOKEN_TTL_SECS", default_value_t = optio_core::auth::config::DEFAULT_ACCESS_TOKEN_TTL_SECS)]
    access_token_ttl_secs: i64,

    #[arg(long, env = "REFRESH_TOKEN_TTL_DAYS", default_value_t = optio_core::auth::config::DEFAULT_REFRESH_TOKEN_TTL_DAYS)]
    refresh_token_ttl_days: i64,

    /// Upper bound for a single storage call, in milliseconds.
    #[arg(long, env = "STORAGE_TIMEOUT_MS", default_value_t = 5000)]
    storage_timeout_ms: u64,

    /// Base URL for session invite links.
    #[arg(long, env = "INVITE_URL")]
    invite_url: Option<String>,

    /// Send the refresh cookie over HTTPS only.
    #[arg(long, env = "COOKIE_SECURE", default_value_t = false)]
    cookie_secure: bool,

    /// Keep everything in process memory instead of PostgreSQL.
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

impl Args {
    fn auth_config(&self) -> Result<AuthConfig, AuthError> {
        let access_token_ttl = chrono::TimeDelta::try_seconds(self.access_token_ttl_secs)
            .ok_or_else(|| AuthError::Validation("access token TTL out of range".into()))?;
        let refresh_token_ttl = chrono::TimeDelta::try_days(self.refresh_token_ttl_days)
            .ok_or_else(|| AuthError::Validation("refresh token TTL out of range".into()))?;
        let config = AuthConfig {
            issuer: self.jwt_issuer.clone(),
            audience: self.jwt_audience.clone(),
            access_token_ttl,
            refresh_token_ttl,
            storage_timeout: Duration::from_millis(self.storage_timeout_ms),
            ..AuthConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,optio_api=debug,optio_core=debug")),
        )
        .init();

    let args = Args::parse();

    let store: Arc<dyn Store> = if args.in_memory {
        warn!("running with in-memory storage; nothing will be persisted");
        Arc::new(MemoryStore::new())
    } else {
        let database_url = args
            .database_url
            .as_deref()
            .ok_or("DATABASE_URL is required without --in-memory")?;
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        info!("running database migrations");
        optio_api::migrate(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    let mut config = ApiConfig::new(SigningSecret::new(args.jwt_secret.as_bytes())?);
    config.bind_addr = args.bind_addr.clone();
    config.auth = args.auth_config()?;
    config.invite_url = args.invite_url.clone();
    config.cookie_secure = args.cookie_secure;
    if config.invite_url.is_none() {
        warn!("INVITE_URL not set; session creation will fail");
    }

    let state = optio_api::AppState::new(store, config.clone())?;
    let app = optio_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
