//! dealgate: authentication and authorization service for the deals
//! platform.
//!
//! The service owns user accounts, registered OAuth clients, and the token
//! pairs that tie the two together. It exposes an HTTP API for
//! registration, the OAuth2 password and refresh_token grants, session
//! revocation, and admin-only client management, plus operator subcommands
//! for bootstrapping the first admin and resetting passwords.
//!
//! # Architecture
//!
//! - **[`auth`]**: password hashing ([`auth::password`]), account
//!   operations ([`auth::service`]), token lifecycle ([`auth::tokens`]),
//!   and request authorization ([`auth::middleware`])
//! - **[`store`]**: storage traits with PostgreSQL and in-memory backends
//! - **[`api`]**: Axum handlers, wire models, OpenAPI document
//! - **[`config`]**: figment-based YAML + environment configuration
//!
//! # Example
//!
//! ```ignore
//! let config = Config::load(&args)?;
//! let app = Application::new(config).await?;
//! app.serve(shutdown_signal()).await?;
//! ```

use std::sync::Arc;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
};
use bon::Builder;
use chrono::Utc;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod store;
pub mod telemetry;
pub mod types;

use auth::{AuthService, Hasher, TokenManager, password::HashingCost, require_admin, require_auth};
pub use config::Config;
use store::{ClientRecord, ClientRegistry, TokenStore, UserDirectory};

/// Shared application state, cloned into every handler.
///
/// Storage is held behind trait objects so the HTTP layer is identical
/// over PostgreSQL in production and the in-memory backends in tests.
#[derive(Clone, Builder)]
pub struct AppState {
    pub users: Arc<dyn UserDirectory>,
    pub clients: Arc<dyn ClientRegistry>,
    pub tokens: TokenManager,
    pub auth: AuthService,
    pub config: Config,
}

impl AppState {
    /// Assemble state from a backend set and configuration. Used by
    /// [`Application::new`] with PostgreSQL backends and by tests with
    /// in-memory ones.
    pub fn from_parts(
        config: Config,
        users: Arc<dyn UserDirectory>,
        clients: Arc<dyn ClientRegistry>,
        token_store: Arc<dyn TokenStore>,
        hasher: Hasher,
    ) -> Self {
        let tokens = TokenManager::new(
            clients.clone(),
            token_store,
            config.auth.access_token_ttl,
            config.auth.refresh_token_ttl,
        );
        let auth = AuthService::new(users.clone(), hasher);
        AppState::builder()
            .users(users)
            .clients(clients)
            .tokens(tokens)
            .auth(auth)
            .config(config)
            .build()
    }

    pub fn hasher_from_config(config: &Config) -> Hasher {
        Hasher::new(HashingCost {
            memory_kib: config.auth.hash_memory_kib,
            iterations: config.auth.hash_iterations,
            parallelism: 1,
        })
    }
}

/// Get the dealgate database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Seed configured OAuth clients into an empty registry.
///
/// Runs only when the registry has no rows at all, so clients deleted
/// through the admin API stay deleted across restarts even if they are
/// still present in the config file.
pub async fn seed_clients(config: &Config, clients: &dyn ClientRegistry) -> anyhow::Result<()> {
    if clients.has_any_client().await? {
        debug!("client registry is non-empty, skipping seed");
        return Ok(());
    }
    for seed in &config.clients {
        info!(client_id = %seed.id, "seeding OAuth client");
        clients
            .create_client(&ClientRecord {
                id: seed.id.clone(),
                secret: seed.secret.clone(),
                domain: seed.domain.clone(),
                created_at: Utc::now(),
            })
            .await?;
    }
    Ok(())
}

/// Build the application router: routes, auth layering, docs, tracing.
///
/// Three route groups with distinct authorization:
/// - public: health, registration, the token endpoint
/// - authenticated: profile and session revocation, behind `require_auth`
/// - admin: client management, behind `require_admin` inside `require_auth`
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/users", post(api::handlers::auth::register))
        .route("/oauth/token", post(api::handlers::auth::token));

    let authed_routes = Router::new()
        .route("/users/me", get(api::handlers::auth::me))
        .route("/oauth/sessions", delete(api::handlers::auth::logout))
        .layer(from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route(
            "/admin/clients",
            get(api::handlers::clients::list_clients).post(api::handlers::clients::create_client),
        )
        .route("/admin/clients/{id}", delete(api::handlers::clients::delete_client))
        // require_auth runs first, then the role gate
        .layer(from_fn(require_admin))
        .layer(from_fn_with_state(state.clone(), require_auth));

    let api_routes = public_routes.merge(authed_routes).merge(admin_routes);

    Router::new()
        .route("/healthz", get(api::handlers::health::healthz))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", api::ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// The assembled service: database pool, state, and router.
///
/// [`Application::new`] connects to PostgreSQL, runs migrations, seeds
/// OAuth clients on first boot, and refuses to start until an admin
/// account exists (`dealgate init` creates one).
pub struct Application {
    router: Router,
    state: AppState,
    pool: PgPool,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = connect_pool(&config).await?;

        let users: Arc<dyn UserDirectory> = Arc::new(store::postgres::PgUserDirectory::new(pool.clone()));
        let clients: Arc<dyn ClientRegistry> = Arc::new(store::postgres::PgClientRegistry::new(pool.clone()));
        let token_store: Arc<dyn TokenStore> = Arc::new(store::postgres::PgTokenStore::new(pool.clone()));

        seed_clients(&config, clients.as_ref()).await?;

        // The service never runs without an admin: every other account and
        // client exists downstream of one.
        if !users.has_admin().await? {
            anyhow::bail!("no admin account exists; run `dealgate init` to create one before serving");
        }

        let hasher = AppState::hasher_from_config(&config);
        let state = AppState::from_parts(config, users, clients, token_store, hasher);
        let router = build_router(state.clone());

        Ok(Self { router, state, pool })
    }

    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.state.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("dealgate listening on http://{bind_addr}");

        let sweeper = spawn_token_sweeper(self.state.tokens.clone());

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        sweeper.abort();
        info!("closing database connections");
        self.pool.close().await;
        Ok(())
    }
}

/// Background sweep removing token pairs whose refresh window has closed.
/// Expired pairs are rejected at use but otherwise sit in the store
/// forever; the sweep runs once at startup and then hourly.
fn spawn_token_sweeper(tokens: TokenManager) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            if let Err(e) = tokens.purge_expired().await {
                warn!("expired token sweep failed: {e:#}");
            }
        }
    })
}

/// Connect to PostgreSQL and bring the schema up to date.
pub async fn connect_pool(config: &Config) -> anyhow::Result<PgPool> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    migrator().run(&pool).await?;
    Ok(pool)
}
