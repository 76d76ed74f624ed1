//! Credential hashing for login passwords and recovery secrets.
//!
//! Both go through the same Argon2id pipeline: a fresh random salt per
//! digest, default work parameters, PHC string output. Plaintext secrets are
//! never logged and never returned past the call boundary.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::{rngs::OsRng, RngCore};

const RECOVERY_SECRET_LEN: usize = 32;
const RECOVERY_SECRET_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Hash a secret with Argon2id and a fresh random salt.
///
/// # Errors
///
/// Returns an error if the hasher fails (entropy exhaustion is the only
/// realistic cause); callers surface it as an internal error.
pub fn hash(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash credential: {err}"))?
        .to_string();
    Ok(digest)
}

/// Verify a secret against a stored PHC digest.
///
/// Malformed digests verify as `false`; the comparison itself is
/// constant-time inside Argon2.
#[must_use]
pub fn verify(secret: &str, digest: &str) -> bool {
    PasswordHash::new(digest).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Generate a recovery secret: 32 alphanumeric characters from the OS RNG.
///
/// # Errors
///
/// Returns an error if the entropy source fails.
pub fn generate_recovery_secret() -> Result<String> {
    let mut raw = [0u8; RECOVERY_SECRET_LEN];
    OsRng
        .try_fill_bytes(&mut raw)
        .context("failed to generate recovery secret")?;

    let mut secret = String::with_capacity(RECOVERY_SECRET_LEN);
    for byte in raw {
        let idx = usize::from(byte) % RECOVERY_SECRET_ALPHABET.len();
        if let Some(&ch) = RECOVERY_SECRET_ALPHABET.get(idx) {
            secret.push(ch as char);
        }
    }
    Ok(secret)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let digest = hash("secret1").unwrap();
        assert!(verify("secret1", &digest));
        assert!(!verify("secret2", &digest));
    }

    #[test]
    fn hash_salts_are_unique() {
        let first = hash("secret1").unwrap();
        let second = hash("secret1").unwrap();
        assert_ne!(first, second);
        assert!(verify("secret1", &first));
        assert!(verify("secret1", &second));
    }

    #[test]
    fn verify_rejects_malformed_digest() {
        assert!(!verify("secret1", "not-a-phc-string"));
        assert!(!verify("secret1", ""));
    }

    #[test]
    fn recovery_secret_shape() {
        let secret = generate_recovery_secret().unwrap();
        assert_eq!(secret.len(), 32);
        assert!(secret.chars().all(|ch| ch.is_ascii_alphanumeric()));
    }

    #[test]
    fn recovery_secrets_are_unique() {
        let first = generate_recovery_secret().unwrap();
        let second = generate_recovery_secret().unwrap();
        assert_ne!(first, second);
    }
}
