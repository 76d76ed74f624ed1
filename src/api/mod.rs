//! HTTP server wiring for the auth core.

use crate::{
    api::handlers::auth,
    session::{self, SessionStore},
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod email;
pub(crate) mod handlers;
mod openapi;

pub use email::{EmailSender, LogEmailSender, MailgunSender};
pub use handlers::auth::{AuthConfig, AuthState};
pub use openapi::openapi;

/// Start the server.
///
/// Owns the session store and its sweeper for the process lifetime: the
/// store is constructed here, injected into the handlers, and the sweeper is
/// stopped when the server shuts down.
///
/// # Errors
///
/// Returns an error if the database, listener, or server fails.
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: AuthConfig,
    email_sender: Arc<dyn EmailSender>,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let sessions = Arc::new(SessionStore::new(auth_config.session_ttl()));
    // One periodic sweep owned by the server lifecycle, not a sweep per login.
    let sweeper = session::spawn_sweeper(sessions.clone(), session::SWEEP_INTERVAL);

    let frontend_origin = frontend_origin(auth_config.base_url())?;
    let auth_state = Arc::new(AuthState::new(auth_config, sessions, email_sender));

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/setup-totp", post(auth::setup_totp))
        .route("/api/auth/verify-totp", post(auth::verify_totp))
        .route(
            "/api/auth/request-password-reset",
            post(auth::request_password_reset),
        )
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/auth/recover-password", post(auth::recover_password))
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
                .layer(cors)
                .layer(Extension(auth_state.clone()))
                .layer(Extension(pool.clone())),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    sweeper.abort();

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

fn frontend_origin(base_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Base URL must include a valid host: {base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
