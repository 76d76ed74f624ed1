//! Small helpers for auth validation and reset-token handling.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};

pub(super) const MIN_PASSWORD_LEN: usize = 6;

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Create a new password-reset token for email links.
///
/// The raw value is only sent to the user; the database stores a hash.
pub(super) fn generate_reset_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate reset token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a reset token so raw values never touch the database.
pub(super) fn hash_reset_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Build the frontend reset link included in outbound emails.
pub(super) fn build_reset_url(base_url: &str, token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{base}/reset-password?token={token}")
}
