//! # LiftLog (Authentication & Session Core)
//!
//! `liftlog` is the authentication core of a single-tenant fitness-tracking
//! backend. It owns the password + TOTP two-factor login flow, one-time
//! recovery-credential issuance, and an in-process session store with
//! expiry. Exercise and workout-log CRUD, schema migrations, and real email
//! delivery are external collaborators.
//!
//! ## Login flow
//!
//! Registration issues recovery credentials and demands TOTP enrollment
//! before the account is usable. The password step of login never creates a
//! session; only a successful TOTP (or backup-code) verification does, and
//! the session rides a single `HttpOnly` cookie afterwards.
//!
//! ## Password reset
//!
//! Two independent flows can rewrite a password: the offline recovery
//! UUID/secret pair shown once at registration, and an emailed token with a
//! one-hour window. Reset requests for unknown emails are indistinguishable
//! from known ones.
//!
//! ## State
//!
//! Sessions live in one process-local store behind a reader/writer lock and
//! do not survive a restart; horizontal scaling needs an external session
//! backend and is out of scope.

pub mod api;
pub mod cli;
pub mod password;
pub mod session;
pub mod totp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
