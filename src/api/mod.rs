use self::handlers::rate_limit::{NoopRateLimiter, RateLimiter, WindowRateLimiter};
use crate::{
    config::SecurityConfig,
    credentials::{Authenticator, CredentialHasher, CredentialStore},
    uploads::{UploadGate, UploadStorage},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer, request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use self::openapi::{openapi, ApiDoc};

// Room for multipart boundaries and part headers around the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Everything the handlers need, built once at startup.
#[derive(Clone)]
pub struct Services {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<CredentialHasher>,
    authenticator: Authenticator,
    gate: UploadGate,
    storage: UploadStorage,
    rate_limiter: Arc<dyn RateLimiter>,
    config: Arc<SecurityConfig>,
}

impl Services {
    /// # Errors
    /// Returns an error if the hashing parameters in `config` are invalid.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        config: Arc<SecurityConfig>,
        storage: UploadStorage,
    ) -> Result<Self> {
        let hasher = Arc::new(CredentialHasher::from_config(&config)?);
        let authenticator =
            Authenticator::new(Arc::clone(&store), Arc::clone(&hasher), config.legacy_login());
        let gate = UploadGate::new(Arc::clone(&config));
        let rate_limiter: Arc<dyn RateLimiter> = match config.rate_limit_attempts() {
            0 => Arc::new(NoopRateLimiter),
            attempts => Arc::new(WindowRateLimiter::new(
                attempts,
                config.rate_limit_window(),
            )),
        };

        Ok(Self {
            store,
            hasher,
            authenticator,
            gate,
            storage,
            rate_limiter,
            config,
        })
    }

    #[must_use]
    pub fn storage(&self) -> &UploadStorage {
        &self.storage
    }
}

/// Build the application router with all layers applied.
#[must_use]
pub fn router(services: Services) -> Router {
    let body_limit = usize::try_from(services.config.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(handlers::health).options(handlers::health))
        .route("/user/register", post(handlers::register))
        .route("/user/login", post(handlers::login))
        .route("/uploads", post(handlers::upload))
        .route("/uploads/:filename", get(handlers::download))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(Extension(services.store))
                .layer(Extension(services.hasher))
                .layer(Extension(services.authenticator))
                .layer(Extension(services.gate))
                .layer(Extension(services.storage))
                .layer(Extension(services.rate_limiter))
                .layer(Extension(services.config)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn serve(port: u16, services: Services) -> Result<()> {
    services.storage().ensure_root().await?;

    let app = router(services);

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
