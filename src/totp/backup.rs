//! Backup codes: single-use fallbacks for when the authenticator device is
//! unavailable. Generated at enable time, returned to the user exactly once,
//! persisted only as Argon2id digests.

use anyhow::{Context, Result};
use rand::{rngs::OsRng, Rng};

use crate::password;

const BACKUP_CODE_LEN: usize = 8;
const BACKUP_CODE_SPACE: u32 = 100_000_000;

/// Generate `count` backup codes, each an 8-digit decimal string drawn
/// uniformly from the OS RNG.
#[must_use]
pub fn generate_backup_codes(count: usize) -> Vec<String> {
    (0..count)
        .map(|_| format!("{:08}", OsRng.gen_range(0..BACKUP_CODE_SPACE)))
        .collect()
}

/// Hash a backup-code batch for storage as a JSON array of digests.
///
/// # Errors
///
/// Returns an error if hashing or serialization fails; callers must abort
/// before enabling TOTP so no partial state is persisted.
pub fn hash_backup_codes(codes: &[String]) -> Result<String> {
    let digests = codes
        .iter()
        .map(|code| password::hash(code))
        .collect::<Result<Vec<_>>>()?;
    serde_json::to_string(&digests).context("failed to serialize backup codes")
}

/// Match a submitted code against the stored digest array.
///
/// On a match, returns the re-serialized array with the matched digest
/// removed so the caller can persist consumption together with the
/// verification outcome. Returns `None` when nothing matches or the stored
/// value cannot be parsed.
#[must_use]
pub fn consume_backup_code(stored_json: &str, submitted: &str) -> Option<String> {
    let submitted = submitted.trim();
    if submitted.len() != BACKUP_CODE_LEN || !submitted.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut digests: Vec<String> = serde_json::from_str(stored_json).ok()?;
    let idx = digests
        .iter()
        .position(|digest| password::verify(submitted, digest))?;
    digests.remove(idx);
    serde_json::to_string(&digests).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_eight_digits() {
        let codes = generate_backup_codes(10);
        assert_eq!(codes.len(), 10);
        for code in &codes {
            assert_eq!(code.len(), 8);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn consume_removes_matched_digest() {
        let codes = generate_backup_codes(3);
        let stored = hash_backup_codes(&codes).unwrap();

        let remaining = consume_backup_code(&stored, &codes[1]).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&remaining).unwrap();
        assert_eq!(parsed.len(), 2);

        // The same code cannot be consumed twice.
        assert!(consume_backup_code(&remaining, &codes[1]).is_none());
        // The others still work against the updated array.
        assert!(consume_backup_code(&remaining, &codes[0]).is_some());
    }

    #[test]
    fn consume_rejects_unknown_and_malformed_codes() {
        let codes = vec!["12345678".to_string()];
        let stored = hash_backup_codes(&codes).unwrap();

        assert!(consume_backup_code(&stored, "87654321").is_none());
        assert!(consume_backup_code(&stored, "1234567").is_none());
        assert!(consume_backup_code(&stored, "1234567a").is_none());
        assert!(consume_backup_code("not json", "12345678").is_none());
    }
}
