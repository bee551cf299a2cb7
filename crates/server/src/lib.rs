//! REST API for copyr.ai.
//!
//! Routes live under [`routes`]; [`build_router`] wires them together with
//! request limiting, CORS, security headers and request tracing.

pub mod auth;
pub mod error;
pub mod pipeline;
pub mod quota;
pub mod routes;
pub mod scheduler;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::header::{
    AUTHORIZATION, CONTENT_TYPE, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::routing::{delete, get, post};
use copyr_client::{CopyrightAnalyzer, SourceClients, SourceError};
use copyr_core::{AppConfig, CacheDb};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::auth::TokenService;
use crate::quota::{RequestLimiter, SearchQuota, limit_requests};

const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: CacheDb,
    pub clients: SourceClients,
    pub analyzer: Arc<CopyrightAnalyzer>,
    /// None when no JWT secret is configured.
    pub tokens: Option<Arc<TokenService>>,
    pub limiter: Arc<RequestLimiter>,
    pub quota: Arc<SearchQuota>,
}

impl AppState {
    pub fn new(config: AppConfig, db: CacheDb) -> Result<Self, SourceError> {
        let clients = SourceClients::from_config(&config)?;
        let analyzer = CopyrightAnalyzer::new(clients.clone(), &config.default_country);
        Ok(Self::with_parts(config, db, clients, analyzer))
    }

    /// State with a caller-supplied analyzer.
    pub fn with_analyzer(config: AppConfig, db: CacheDb, analyzer: CopyrightAnalyzer) -> Result<Self, SourceError> {
        let clients = SourceClients::from_config(&config)?;
        Ok(Self::with_parts(config, db, clients, analyzer))
    }

    fn with_parts(config: AppConfig, db: CacheDb, clients: SourceClients, analyzer: CopyrightAnalyzer) -> Self {
        if config.jwt_secret.is_none() {
            tracing::warn!("no JWT secret configured, authenticated routes are disabled");
        }
        Self {
            tokens: config.jwt_secret.as_deref().map(|secret| Arc::new(TokenService::new(secret))),
            limiter: Arc::new(RequestLimiter::new(
                config.rate_limit_max_requests as usize,
                Duration::from_secs(config.rate_limit_window_secs),
            )),
            quota: Arc::new(SearchQuota::new(
                config.anonymous_search_limit,
                Duration::from_secs(config.anonymous_search_window_secs),
            )),
            analyzer: Arc::new(analyzer),
            clients,
            db,
            config: Arc::new(config),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let mut allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| HeaderValue::from_str(o.trim()).ok()).collect();
    if allowed.is_empty() {
        allowed = DEFAULT_CORS_ORIGINS.iter().map(|o| HeaderValue::from_static(o)).collect();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true)
}

/// The full application router.
pub fn build_router(state: AppState) -> Router {
    use routes::{admin, health, search, users, works};

    let limited = Router::new()
        .route("/search", post(search::search_works))
        .route("/popular-works", get(works::popular_works))
        .route("/countries", get(works::countries))
        .route("/copyright-info", get(works::default_copyright_info))
        .route("/copyright-info/:country", get(works::copyright_info))
        .route("/autocomplete", get(works::autocomplete))
        .route("/user/:user_id/profile", get(users::get_profile))
        .route(
            "/user/:user_id/search-history",
            get(users::get_search_history).post(users::save_search_history).delete(users::clear_search_history),
        )
        .route("/user/:user_id/search-history/:search_id", delete(users::delete_search_history_item))
        .route("/admin/login", post(admin::login))
        .route("/admin/verify", get(admin::verify))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_requests));

    let probes = Router::new()
        .route("/status", get(health::api_status))
        .route("/health/liveness", get(health::liveness))
        .route("/health/readiness", get(health::readiness))
        .route("/metrics", get(health::metrics));

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .nest("/api", limited.merge(probes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_origins))
                .layer(SetResponseHeaderLayer::overriding(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")))
                .layer(SetResponseHeaderLayer::overriding(X_FRAME_OPTIONS, HeaderValue::from_static("DENY")))
                .layer(SetResponseHeaderLayer::overriding(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")))
                .layer(SetResponseHeaderLayer::overriding(
                    REFERRER_POLICY,
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                )),
        )
        .with_state(state)
}
