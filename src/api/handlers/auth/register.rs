//! Registration: credential creation and one-time recovery issuance.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::password;

use super::storage::{self, InsertOutcome};
use super::types::{RecoveryCredentials, RegisterRequest, RegisterResponse, UserSummary};
use super::utils::{normalize_email, valid_email, MIN_PASSWORD_LEN};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered; TOTP setup required before login", body = RegisterResponse),
        (status = 400, description = "Malformed username, email, or password", body = String),
        (status = 409, description = "Username or email already exists", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let username = request.username.trim().to_string();
    let email = normalize_email(&request.email);

    if username.is_empty() || email.is_empty() || request.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "Username, email, and password are required".to_string(),
        )
            .into_response();
    }
    if request.password.len() < MIN_PASSWORD_LEN {
        return (
            StatusCode::BAD_REQUEST,
            "Password must be at least 6 characters".to_string(),
        )
            .into_response();
    }
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email address".to_string()).into_response();
    }

    // Pre-checks give precise conflict messages; the insert below still
    // catches the race via the unique constraints.
    match storage::username_exists(&pool, &username).await {
        Ok(true) => {
            return (
                StatusCode::CONFLICT,
                "Username already exists".to_string(),
            )
                .into_response()
        }
        Ok(false) => {}
        Err(err) => {
            error!("Registration error: {err}");
            return internal_error();
        }
    }
    match storage::email_exists(&pool, &email).await {
        Ok(true) => {
            return (StatusCode::CONFLICT, "Email already exists".to_string()).into_response()
        }
        Ok(false) => {}
        Err(err) => {
            error!("Registration error: {err}");
            return internal_error();
        }
    }

    // Recovery credentials are generated server-side and shown exactly once.
    let recovery_uuid = Uuid::new_v4();
    let recovery_secret = match password::generate_recovery_secret() {
        Ok(secret) => secret,
        Err(err) => {
            error!("Failed to generate recovery secret: {err}");
            return internal_error();
        }
    };
    let recovery_secret_hash = match password::hash(&recovery_secret) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash recovery secret: {err}");
            return internal_error();
        }
    };
    let password_hash = match password::hash(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return internal_error();
        }
    };

    match storage::insert_user(
        &pool,
        &username,
        &email,
        &password_hash,
        recovery_uuid,
        &recovery_secret_hash,
    )
    .await
    {
        Ok(InsertOutcome::Created { user_id }) => {
            // No session yet: the account becomes usable only after TOTP
            // enrollment is confirmed.
            let response = RegisterResponse {
                message: "User registered successfully. TOTP setup required.".to_string(),
                user: UserSummary {
                    id: user_id.to_string(),
                    username,
                    email: Some(email),
                },
                recovery: RecoveryCredentials {
                    uuid: recovery_uuid.to_string(),
                    secret: recovery_secret,
                },
                requires_totp_setup: true,
            };
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Ok(InsertOutcome::Conflict) => (
            StatusCode::CONFLICT,
            "Username or email already exists".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Registration error: {err}");
            internal_error()
        }
    }
}

fn internal_error() -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
        .into_response()
}
