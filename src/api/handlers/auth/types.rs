//! Request/response types for auth endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Offline recovery credentials, shown exactly once at registration.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RecoveryCredentials {
    pub uuid: String,
    pub secret: String,
}

/// Minimal user view returned by registration/login/reset responses.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserSummary,
    pub recovery: RecoveryCredentials,
    pub requires_totp_setup: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Password was accepted; the caller must complete (or set up) TOTP before a
/// session is issued.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub message: String,
    pub username: String,
    pub requires_totp: bool,
    pub requires_totp_setup: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SetupTotpRequest {
    pub username: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SetupTotpResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_codes: Option<Vec<String>>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyTotpRequest {
    pub username: String,
    pub code: String,
}

/// Terminal success payload for flows that end authenticated or with a
/// rewritten password.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub message: String,
    pub user: UserSummary,
}

/// Stored profile for the authenticated user.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub totp_enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub user: UserProfile,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RequestPasswordResetRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RecoverPasswordRequest {
    pub recovery_uuid: String,
    pub recovery_secret: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn register_request_round_trips() -> Result<()> {
        let request = RegisterRequest {
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            password: "secret1".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let username = value
            .get("username")
            .and_then(serde_json::Value::as_str)
            .context("missing username")?;
        assert_eq!(username, "alice");
        let decoded: RegisterRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.email, "alice@x.com");
        Ok(())
    }

    #[test]
    fn setup_totp_code_defaults_to_absent() -> Result<()> {
        let decoded: SetupTotpRequest = serde_json::from_str(r#"{"username":"alice"}"#)?;
        assert_eq!(decoded.code, None);

        let decoded: SetupTotpRequest =
            serde_json::from_str(r#"{"username":"alice","code":"123456"}"#)?;
        assert_eq!(decoded.code.as_deref(), Some("123456"));
        Ok(())
    }

    #[test]
    fn setup_totp_response_omits_empty_fields() -> Result<()> {
        let response = SetupTotpResponse {
            message: "TOTP enabled successfully".to_string(),
            secret: None,
            qr_code: None,
            backup_codes: Some(vec!["12345678".to_string()]),
        };
        let value = serde_json::to_value(&response)?;
        assert!(value.get("secret").is_none());
        assert!(value.get("qr_code").is_none());
        assert!(value.get("backup_codes").is_some());
        Ok(())
    }

    #[test]
    fn user_summary_omits_missing_email() -> Result<()> {
        let summary = UserSummary {
            id: "2c6e4c1e-8f2a-4af1-9fb4-9e4c7a4e7a11".to_string(),
            username: "alice".to_string(),
            email: None,
        };
        let value = serde_json::to_value(&summary)?;
        assert!(value.get("email").is_none());
        Ok(())
    }
}
