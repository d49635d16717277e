/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use keystone_api::{app::AppState, config::Config};
/// use keystone_shared::db::pool::create_pool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.database_config()).await?;
/// let state = AppState::new(pool, None, config);
/// let app = keystone_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use keystone_shared::auth::{cookies::CookieSettings, middleware::authenticate};
use keystone_shared::cache::{user_profile_entry, CacheManager, VersionedKey};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Profile cache; `None` when Redis is disabled or unreachable
    pub cache: Option<CacheManager>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, cache: Option<CacheManager>, config: Config) -> Self {
        Self {
            db,
            cache,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        self.config.jwt_secret()
    }

    pub fn cookie_settings(&self) -> CookieSettings {
        self.config.cookie_settings()
    }

    /// Invalidates cached profiles of users whose workspace list changed
    ///
    /// Call after the change is committed.
    pub async fn invalidate_profiles(&self, user_ids: &[Uuid]) {
        let Some(cache) = &self.cache else {
            return;
        };

        let entries: Vec<VersionedKey> = user_ids.iter().copied().map(user_profile_entry).collect();
        let invalidated = cache.invalidate(&entries).await;
        tracing::debug!(users = user_ids.len(), invalidated, "Invalidated cached profiles");
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                           # Health check (public)
/// └── /auth/
///     ├── POST /register                    # public
///     ├── POST /login                       # public
///     ├── POST /refresh                     # refresh cookie
///     ├── POST /logout                      # public
///     ├── GET  /users                       # access cookie
///     └── /workspaces/                      # access cookie
///         ├── GET    /
///         ├── POST   /create
///         ├── POST   /search
///         ├── GET    /:id
///         ├── PATCH  /:id
///         ├── DELETE /:id
///         └── POST   /:id/add_user
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Cookie authentication (protected routes only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Public auth routes; refresh reads its own cookie
    let public_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/logout", post(routes::auth::logout));

    let protected_auth_routes = Router::new()
        .route("/users", get(routes::auth::current_user))
        .route("/workspaces", get(routes::workspaces::list_workspaces))
        .route("/workspaces/create", post(routes::workspaces::create_workspace))
        .route("/workspaces/search", post(routes::workspaces::search_workspaces))
        .route(
            "/workspaces/:workspace_id",
            get(routes::workspaces::get_workspace)
                .patch(routes::workspaces::update_workspace)
                .delete(routes::workspaces::delete_workspace),
        )
        .route(
            "/workspaces/:workspace_id/add_user",
            post(routes::workspaces::add_user_to_workspace),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            cookie_auth_layer,
        ));

    let auth_routes = public_auth_routes.merge(protected_auth_routes);

    // Configure CORS based on environment
    let cors = if state.config.cors_allows_any() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        // Credentials are required for the auth cookies
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::COOKIE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/auth", auth_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(!state.config.debug))
        .with_state(state)
}

/// Cookie authentication middleware layer
///
/// Validates the access cookie, then injects `AuthContext` into request
/// extensions.
async fn cookie_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_context = authenticate(req.headers(), state.jwt_secret())?;

    tracing::debug!(user_id = %auth_context.user_id, "Request authenticated from cookie");
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
