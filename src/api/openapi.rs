//! `OpenAPI` document for the auth endpoints.
//!
//! Routes are registered on the router in `api::new`; add new endpoints to
//! `paths(...)` here so the served spec stays in sync.

use utoipa::OpenApi;

use super::handlers::auth::types::{
    AuthResponse, LoginRequest, LoginResponse, MeResponse, MessageResponse,
    RecoverPasswordRequest, RecoveryCredentials, RegisterRequest, RegisterResponse,
    RequestPasswordResetRequest, ResetPasswordRequest, SetupTotpRequest, SetupTotpResponse,
    UserProfile, UserSummary, VerifyTotpRequest,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::health::health,
        crate::api::handlers::auth::register::register,
        crate::api::handlers::auth::login::login,
        crate::api::handlers::auth::totp::setup_totp,
        crate::api::handlers::auth::totp::verify_totp,
        crate::api::handlers::auth::session::me,
        crate::api::handlers::auth::session::logout,
        crate::api::handlers::auth::reset::request_password_reset,
        crate::api::handlers::auth::reset::reset_password,
        crate::api::handlers::auth::reset::recover_password,
    ),
    components(schemas(
        RegisterRequest,
        RegisterResponse,
        RecoveryCredentials,
        UserSummary,
        LoginRequest,
        LoginResponse,
        SetupTotpRequest,
        SetupTotpResponse,
        VerifyTotpRequest,
        AuthResponse,
        UserProfile,
        MeResponse,
        MessageResponse,
        RequestPasswordResetRequest,
        ResetPasswordRequest,
        RecoverPasswordRequest,
    )),
    tags(
        (name = "auth", description = "Registration, login, TOTP, sessions, and password reset"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_all_auth_paths() {
        let doc = openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/health",
            "/api/auth/register",
            "/api/auth/login",
            "/api/auth/logout",
            "/api/auth/me",
            "/api/auth/setup-totp",
            "/api/auth/verify-totp",
            "/api/auth/request-password-reset",
            "/api/auth/reset-password",
            "/api/auth/recover-password",
        ] {
            assert!(paths.contains_key(path), "missing path: {path}");
        }
    }
}
