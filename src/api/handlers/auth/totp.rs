//! TOTP enrollment and login completion.
//!
//! Setup runs pre-session against a registered identity: the account is not
//! usable until enrollment is confirmed, and the endpoint refuses once TOTP
//! is enabled, so an anonymous caller can never rotate an active credential.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::totp::{self, TotpKey};

use super::session::session_cookie;
use super::state::AuthState;
use super::storage;
use super::types::{
    AuthResponse, SetupTotpRequest, SetupTotpResponse, UserSummary, VerifyTotpRequest,
};

const BACKUP_CODE_COUNT: usize = 10;

#[utoipa::path(
    post,
    path = "/api/auth/setup-totp",
    request_body = SetupTotpRequest,
    responses(
        (status = 200, description = "Enrollment secret issued, or TOTP enabled with backup codes", body = SetupTotpResponse),
        (status = 400, description = "Missing fields or no pending secret", body = String),
        (status = 401, description = "Invalid TOTP code", body = String),
        (status = 403, description = "TOTP is already enabled", body = String),
        (status = 404, description = "User not found", body = String)
    ),
    tag = "auth"
)]
pub async fn setup_totp(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SetupTotpRequest>>,
) -> impl IntoResponse {
    let request: SetupTotpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let username = request.username.trim();
    if username.is_empty() {
        return (StatusCode::BAD_REQUEST, "Username is required".to_string()).into_response();
    }

    let record = match storage::lookup_totp(&pool, username).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "User not found".to_string()).into_response()
        }
        Err(err) => {
            error!("TOTP setup error: {err}");
            return internal_error();
        }
    };

    if record.totp_enabled {
        return (
            StatusCode::FORBIDDEN,
            "TOTP is already enabled".to_string(),
        )
            .into_response();
    }

    let code = request.code.as_deref().map_or("", str::trim);

    // No code yet: start (or restart) enrollment with a fresh secret.
    if code.is_empty() {
        let key = match TotpKey::generate(auth_state.config().totp_issuer(), &record.username) {
            Ok(key) => key,
            Err(err) => {
                error!("Failed to generate TOTP secret: {err}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to generate TOTP secret".to_string(),
                )
                    .into_response();
            }
        };
        let qr_code = match key.qr_data_url() {
            Ok(qr) => qr,
            Err(err) => {
                error!("Failed to generate QR code: {err}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to generate QR code".to_string(),
                )
                    .into_response();
            }
        };
        if let Err(err) = storage::store_totp_secret(&pool, record.user_id, &key.secret_base32()).await
        {
            error!("Failed to store TOTP secret: {err}");
            return internal_error();
        }

        let response = SetupTotpResponse {
            message: "Scan the QR code with your authenticator app".to_string(),
            secret: Some(key.secret_base32()),
            qr_code: Some(qr_code),
            backup_codes: None,
        };
        return (StatusCode::OK, Json(response)).into_response();
    }

    // Code supplied: confirm the pending secret and enable TOTP.
    let Some(secret) = record.totp_secret else {
        return (
            StatusCode::BAD_REQUEST,
            "No TOTP secret found. Please request a new one.".to_string(),
        )
            .into_response();
    };
    if !totp::validate_code(&secret, code) {
        return (StatusCode::UNAUTHORIZED, "Invalid TOTP code".to_string()).into_response();
    }

    let backup_codes = totp::generate_backup_codes(BACKUP_CODE_COUNT);
    // Hash before enabling; a hashing failure must not leave the flag set.
    let hashed = match totp::hash_backup_codes(&backup_codes) {
        Ok(hashed) => hashed,
        Err(err) => {
            error!("Failed to hash backup codes: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate backup codes".to_string(),
            )
                .into_response();
        }
    };
    if let Err(err) = storage::enable_totp(&pool, record.user_id, &hashed).await {
        error!("Failed to enable TOTP: {err}");
        return internal_error();
    }

    // Plaintext backup codes leave the server exactly once, here.
    let response = SetupTotpResponse {
        message: "TOTP enabled successfully".to_string(),
        secret: None,
        qr_code: None,
        backup_codes: Some(backup_codes),
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-totp",
    request_body = VerifyTotpRequest,
    responses(
        (status = 200, description = "Code accepted; session cookie set", body = AuthResponse),
        (status = 400, description = "Missing fields or TOTP not enabled", body = String),
        (status = 401, description = "Invalid TOTP code", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_totp(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyTotpRequest>>,
) -> impl IntoResponse {
    let request: VerifyTotpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let username = request.username.trim();
    let code = request.code.trim();
    if username.is_empty() || code.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "Username and TOTP code are required".to_string(),
        )
            .into_response();
    }

    let record = match storage::lookup_totp(&pool, username).await {
        Ok(Some(record)) => record,
        // Same body as a wrong code; this endpoint completes login and must
        // not confirm account existence.
        Ok(None) => return unauthorized(),
        Err(err) => {
            error!("Verify TOTP error: {err}");
            return internal_error();
        }
    };

    if !record.totp_enabled {
        return (
            StatusCode::BAD_REQUEST,
            "TOTP is not enabled for this user".to_string(),
        )
            .into_response();
    }

    let mut valid = record
        .totp_secret
        .as_deref()
        .is_some_and(|secret| totp::validate_code(secret, code));

    // Fall back to backup codes; a matched code is consumed in the same
    // update that concludes verification.
    if !valid {
        if let Some(stored) = record.totp_backup_codes.as_deref() {
            if let Some(remaining) = totp::consume_backup_code(stored, code) {
                if let Err(err) =
                    storage::update_backup_codes(&pool, record.user_id, &remaining).await
                {
                    error!("Failed to consume backup code: {err}");
                    return internal_error();
                }
                valid = true;
            }
        }
    }

    if !valid {
        return unauthorized();
    }

    let token = match auth_state
        .sessions()
        .create(record.user_id, &record.username)
        .await
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to create session: {err}");
            return internal_error();
        }
    };

    let mut headers = HeaderMap::new();
    match session_cookie(auth_state.config(), &token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return internal_error();
        }
    }

    let response = AuthResponse {
        message: "Login successful".to_string(),
        user: UserSummary {
            id: record.user_id.to_string(),
            username: record.username,
            email: None,
        },
    };
    (StatusCode::OK, headers, Json(response)).into_response()
}

fn unauthorized() -> axum::response::Response {
    (StatusCode::UNAUTHORIZED, "Invalid TOTP code".to_string()).into_response()
}

fn internal_error() -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
        .into_response()
}
