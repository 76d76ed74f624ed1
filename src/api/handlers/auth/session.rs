//! Session cookie handling, the current-user endpoint, and logout.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::session::{Session, SessionStore};

use super::state::{AuthConfig, AuthState};
use super::storage;
use super::types::{MeResponse, MessageResponse, UserProfile};

const SESSION_COOKIE_NAME: &str = "liftlog_session";

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current authenticated user", body = MeResponse),
        (status = 401, description = "No valid session attached", body = String)
    ),
    tag = "auth"
)]
pub async fn me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let Some(session) = authenticate_session(&headers, auth_state.sessions()).await else {
        return (
            StatusCode::UNAUTHORIZED,
            "Authentication required".to_string(),
        )
            .into_response();
    };

    match storage::lookup_profile(&pool, session.user_id).await {
        Ok(Some(profile)) => {
            let response = MeResponse {
                user: UserProfile {
                    id: profile.user_id.to_string(),
                    username: profile.username,
                    email: profile.email,
                    totp_enabled: profile.totp_enabled,
                    created_at: profile.created_at,
                },
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        // The session outlived the row; treat it like any stale lookup.
        Ok(None) => (StatusCode::NOT_FOUND, "User not found".to_string()).into_response(),
        Err(err) => {
            error!("Get current user error: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        auth_state.sessions().delete(&token).await;
    }

    // Always clear the cookie, even when no session resolved.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    let response = MessageResponse {
        message: "Logged out successfully".to_string(),
    };
    (StatusCode::OK, response_headers, Json(response)).into_response()
}

/// Resolve the session cookie into a live session, if any.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    sessions: &SessionStore,
) -> Option<Session> {
    let token = extract_session_token(headers)?;
    sessions.get(&token).await
}

/// Build the `HttpOnly` session cookie carrying `token`.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::response::IntoResponse;
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    use crate::api::email::LogEmailSender;

    fn auth_state(base_url: &str) -> Arc<AuthState> {
        let config = AuthConfig::new(base_url.to_string());
        let sessions = Arc::new(SessionStore::new(config.session_ttl()));
        Arc::new(AuthState::new(config, sessions, Arc::new(LogEmailSender)))
    }

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn session_cookie_shape() {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        let cookie = session_cookie(&config, "tok").unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("liftlog_session=tok; "));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=86400"));
        assert!(!value.contains("Secure"));

        let config = AuthConfig::new("https://liftlog.fit".to_string());
        let cookie = session_cookie(&config, "tok").unwrap();
        assert!(cookie.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        let cookie = clear_session_cookie(&config).unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("liftlog_session=; "));
        assert!(value.contains("Max-Age=0"));
    }

    #[test]
    fn extract_session_token_parses_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; liftlog_session=tok; theme=dark"),
        );
        assert_eq!(extract_session_token(&headers), Some("tok".to_string()));

        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn authenticate_session_round_trip() -> Result<()> {
        let state = auth_state("http://localhost:5173");
        let token = state.sessions().create(Uuid::new_v4(), "alice").await?;

        let session = authenticate_session(&cookie_headers(&token), state.sessions()).await;
        assert_eq!(session.map(|s| s.username), Some("alice".to_string()));

        let session = authenticate_session(&cookie_headers("bogus"), state.sessions()).await;
        assert!(session.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn me_without_session_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = me(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state("http://localhost:5173")),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn logout_deletes_session_and_clears_cookie() -> Result<()> {
        let state = auth_state("http://localhost:5173");
        let token = state.sessions().create(Uuid::new_v4(), "alice").await?;

        let response = logout(cookie_headers(&token), Extension(state.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(set_cookie.contains("Max-Age=0"));
        assert!(state.sessions().get(&token).await.is_none());

        // Idempotent: a second logout with the same cookie still succeeds.
        let response = logout(cookie_headers(&token), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
