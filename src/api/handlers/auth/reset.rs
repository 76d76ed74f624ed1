//! Password reset flows.
//!
//! Variant A: offline recovery credentials issued at registration, no
//! expiry. Variant B: an emailed token with a one-hour window, stored only
//! as a hash and consumed atomically with the password rewrite.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::api::email;
use crate::password;

use super::state::AuthState;
use super::storage;
use super::types::{
    AuthResponse, MessageResponse, RecoverPasswordRequest, RequestPasswordResetRequest,
    ResetPasswordRequest, UserSummary,
};
use super::utils::{
    build_reset_url, generate_reset_token, hash_reset_token, normalize_email, MIN_PASSWORD_LEN,
};

const RESET_ACCEPTED: &str = "If the email exists, a password reset link has been sent";

#[utoipa::path(
    post,
    path = "/api/auth/request-password-reset",
    request_body = RequestPasswordResetRequest,
    responses(
        (status = 200, description = "Accepted; the body never reveals whether the email exists", body = MessageResponse),
        (status = 400, description = "Missing email", body = String)
    ),
    tag = "auth"
)]
pub async fn request_password_reset(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RequestPasswordResetRequest>>,
) -> impl IntoResponse {
    let request: RequestPasswordResetRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if email.is_empty() {
        return (StatusCode::BAD_REQUEST, "Email is required".to_string()).into_response();
    }

    let target = match storage::find_user_by_email(&pool, &email).await {
        Ok(Some(target)) => target,
        // Unknown emails get the exact same response, with no token created.
        Ok(None) => return accepted(),
        Err(err) => {
            error!("Request password reset error: {err}");
            return internal_error();
        }
    };

    let token = match generate_reset_token() {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to generate token: {err}");
            return internal_error();
        }
    };
    let token_hash = hash_reset_token(&token);
    if let Err(err) = storage::store_reset_token(
        &pool,
        target.user_id,
        &token_hash,
        auth_state.config().reset_token_ttl_seconds(),
    )
    .await
    {
        error!("Failed to store reset token: {err}");
        return internal_error();
    }

    // Delivery is out-of-band; the token stays valid even if the send fails.
    let reset_url = build_reset_url(auth_state.config().base_url(), &token);
    email::spawn_send(
        auth_state.email(),
        email::password_reset_email(&target.email, &reset_url),
    );

    accepted()
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password rewritten and token invalidated", body = AuthResponse),
        (status = 400, description = "Missing fields or short password", body = String),
        (status = 401, description = "Invalid or expired reset token", body = String)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let token = request.token.trim();
    if token.is_empty() || request.new_password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "Token and new password are required".to_string(),
        )
            .into_response();
    }
    if request.new_password.len() < MIN_PASSWORD_LEN {
        return (
            StatusCode::BAD_REQUEST,
            "Password must be at least 6 characters".to_string(),
        )
            .into_response();
    }

    let password_hash = match password::hash(&request.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return internal_error();
        }
    };

    // One statement checks the hash and expiry, rewrites the password, and
    // clears the token, so a consumed token can never be replayed.
    let token_hash = hash_reset_token(token);
    match storage::consume_reset_token(&pool, &token_hash, &password_hash).await {
        Ok(Some(user)) => {
            let response = AuthResponse {
                message: "Password reset successfully".to_string(),
                user: UserSummary {
                    id: user.user_id.to_string(),
                    username: user.username,
                    email: user.email,
                },
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            "Invalid or expired reset token".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Reset password error: {err}");
            internal_error()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/recover-password",
    request_body = RecoverPasswordRequest,
    responses(
        (status = 200, description = "Password rewritten", body = AuthResponse),
        (status = 400, description = "Missing fields or short password", body = String),
        (status = 401, description = "Invalid recovery credentials", body = String)
    ),
    tag = "auth"
)]
pub async fn recover_password(
    pool: Extension<PgPool>,
    payload: Option<Json<RecoverPasswordRequest>>,
) -> impl IntoResponse {
    let request: RecoverPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let uuid_input = request.recovery_uuid.trim();
    let secret = request.recovery_secret.trim();
    if uuid_input.is_empty() || secret.is_empty() || request.new_password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "Recovery UUID, recovery secret, and new password are required".to_string(),
        )
            .into_response();
    }
    if request.new_password.len() < MIN_PASSWORD_LEN {
        return (
            StatusCode::BAD_REQUEST,
            "Password must be at least 6 characters".to_string(),
        )
            .into_response();
    }

    // Unparseable UUIDs answer like unknown ones; the caller learns nothing
    // about which part of the pair was wrong.
    let Ok(recovery_uuid) = Uuid::parse_str(uuid_input) else {
        return invalid_recovery();
    };

    let record = match storage::lookup_recovery(&pool, recovery_uuid).await {
        Ok(Some(record)) => record,
        Ok(None) => return invalid_recovery(),
        Err(err) => {
            error!("Password recovery error: {err}");
            return internal_error();
        }
    };

    let Some(secret_hash) = record.recovery_secret_hash.as_deref() else {
        return invalid_recovery();
    };
    if !password::verify(secret, secret_hash) {
        return invalid_recovery();
    }

    let password_hash = match password::hash(&request.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return internal_error();
        }
    };
    if let Err(err) = storage::update_password(&pool, record.user_id, &password_hash).await {
        error!("Failed to update password: {err}");
        return internal_error();
    }

    let response = AuthResponse {
        message: "Password reset successfully".to_string(),
        user: UserSummary {
            id: record.user_id.to_string(),
            username: record.username,
            email: record.email,
        },
    };
    (StatusCode::OK, Json(response)).into_response()
}

fn accepted() -> axum::response::Response {
    (
        StatusCode::OK,
        Json(MessageResponse {
            message: RESET_ACCEPTED.to_string(),
        }),
    )
        .into_response()
}

fn invalid_recovery() -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        "Invalid recovery credentials".to_string(),
    )
        .into_response()
}

fn internal_error() -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::response::IntoResponse;
    use sqlx::postgres::PgPoolOptions;

    use crate::api::email::LogEmailSender;
    use crate::api::handlers::auth::state::AuthConfig;
    use crate::session::SessionStore;

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        let sessions = Arc::new(SessionStore::new(config.session_ttl()));
        Arc::new(AuthState::new(config, sessions, Arc::new(LogEmailSender)))
    }

    #[tokio::test]
    async fn request_reset_requires_email() -> Result<()> {
        let response = request_password_reset(
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(RequestPasswordResetRequest {
                email: "  ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_rejects_short_password() -> Result<()> {
        let response = reset_password(
            Extension(lazy_pool()?),
            Some(Json(ResetPasswordRequest {
                token: "token".to_string(),
                new_password: "short".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn recover_password_rejects_malformed_uuid() -> Result<()> {
        let response = recover_password(
            Extension(lazy_pool()?),
            Some(Json(RecoverPasswordRequest {
                recovery_uuid: "not-a-uuid".to_string(),
                recovery_secret: "secret".to_string(),
                new_password: "secret1".to_string(),
            })),
        )
        .await
        .into_response();
        // Indistinguishable from unknown credentials.
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn recover_password_requires_all_fields() -> Result<()> {
        let response = recover_password(
            Extension(lazy_pool()?),
            Some(Json(RecoverPasswordRequest {
                recovery_uuid: String::new(),
                recovery_secret: "secret".to_string(),
                new_password: "secret1".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
