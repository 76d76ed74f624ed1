//! Password step of the login flow.
//!
//! A successful password check never issues a session on its own: the
//! response only says which TOTP step comes next.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use tracing::error;

use crate::password;

use super::storage;
use super::types::{LoginRequest, LoginResponse};

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Password accepted; TOTP challenge or setup required", body = LoginResponse),
        (status = 400, description = "Missing username or password", body = String),
        (status = 401, description = "Invalid username or password", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "Username and password are required".to_string(),
        )
            .into_response();
    }

    let record = match storage::lookup_credentials(&pool, username).await {
        Ok(Some(record)) => record,
        // Unknown user and wrong password answer identically so usernames
        // cannot be enumerated.
        Ok(None) => return unauthorized(),
        Err(err) => {
            error!("Login error: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
                .into_response();
        }
    };

    if !password::verify(&request.password, &record.password_hash) {
        return unauthorized();
    }

    let response = LoginResponse {
        message: if record.totp_enabled {
            "TOTP verification required".to_string()
        } else {
            "TOTP setup required".to_string()
        },
        username: record.username,
        requires_totp: record.totp_enabled,
        requires_totp_setup: !record.totp_enabled,
    };
    (StatusCode::OK, Json(response)).into_response()
}

fn unauthorized() -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        "Invalid username or password".to_string(),
    )
        .into_response()
}
