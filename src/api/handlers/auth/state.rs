//! Auth configuration and shared state for the flow handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::api::email::EmailSender;
use crate::session::SessionStore;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 24 * 60 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_TOTP_ISSUER: &str = "LiftLog";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    totp_issuer: String,
    session_ttl_seconds: u64,
    reset_token_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            totp_issuer: DEFAULT_TOTP_ISSUER.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_totp_issuer(mut self, issuer: String) -> Self {
        self.totp_issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn totp_issuer(&self) -> &str {
        &self.totp_issuer
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    pub(super) fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    pub(super) fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    sessions: Arc<SessionStore>,
    email: Arc<dyn EmailSender>,
}

impl AuthState {
    pub fn new(config: AuthConfig, sessions: Arc<SessionStore>, email: Arc<dyn EmailSender>) -> Self {
        Self {
            config,
            sessions,
            email,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub(super) fn email(&self) -> Arc<dyn EmailSender> {
        self.email.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::LogEmailSender;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://liftlog.fit".to_string());

        assert_eq!(config.base_url(), "https://liftlog.fit");
        assert_eq!(config.totp_issuer(), DEFAULT_TOTP_ISSUER);
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert_eq!(
            config.reset_token_ttl_seconds(),
            DEFAULT_RESET_TOKEN_TTL_SECONDS
        );
        assert!(config.session_cookie_secure());

        let config = config
            .with_totp_issuer("Gym".to_string())
            .with_session_ttl_seconds(60)
            .with_reset_token_ttl_seconds(120);

        assert_eq!(config.totp_issuer(), "Gym");
        assert_eq!(config.session_ttl(), Duration::from_secs(60));
        assert_eq!(config.reset_token_ttl_seconds(), 120);
    }

    #[test]
    fn cookie_secure_follows_scheme() {
        assert!(!AuthConfig::new("http://localhost:5173".to_string()).session_cookie_secure());
        assert!(AuthConfig::new("https://liftlog.fit".to_string()).session_cookie_secure());
    }

    #[test]
    fn auth_state_exposes_parts() {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        let sessions = Arc::new(SessionStore::new(config.session_ttl()));
        let state = AuthState::new(config, sessions, Arc::new(LogEmailSender));
        assert_eq!(state.config().base_url(), "http://localhost:5173");
        assert_eq!(state.sessions().ttl(), Duration::from_secs(86400));
    }
}
