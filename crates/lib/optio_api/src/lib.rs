//! # optio_api
//!
//! HTTP API library for Optio.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use optio_core::auth::{AuthError, PasswordHasher};
use optio_core::sessions::{CodeGenerator, SessionService};
use optio_core::store::Store;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, sessions};
use crate::services::auth::AuthService;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub sessions: Arc<SessionService<dyn Store>>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the services over one storage handle.
    pub fn new(store: Arc<dyn Store>, config: ApiConfig) -> Result<Self, AuthError> {
        let auth = AuthService::new(
            store.clone(),
            &config.jwt_secret,
            &config.auth,
            PasswordHasher::with_cost(config.bcrypt_cost),
        )?;
        let sessions = SessionService::new(
            store,
            CodeGenerator::default(),
            config.invite_url.clone(),
            config.auth.storage_timeout,
        );
        Ok(Self {
            auth: Arc::new(auth),
            sessions: Arc::new(sessions),
            config,
        })
    }
}

/// Run embedded database migrations.
///
/// Delegates to `optio_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    optio_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_AUTH_PROFILE, get(auth::profile_handler))
        .route(routes::POST_AUTH_PASSWORD, post(auth::change_password_handler))
        .route(routes::POST_SESSIONS, post(sessions::create_session_handler))
        .route(routes::POST_SESSIONS_JOIN, post(sessions::join_session_handler))
        .route(routes::GET_SESSIONS_CODE, get(sessions::get_session_handler))
        .route(routes::POST_SESSIONS_ID_END, post(sessions::end_session_handler))
        .route(routes::POST_SESSIONS_ID_ITEMS, post(sessions::add_item_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
