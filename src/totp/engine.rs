//! Shared-secret generation and time-step code validation.

use anyhow::{anyhow, Result};
use totp_rs::{Algorithm, Secret, TOTP};

const TOTP_DIGITS: usize = 6;
const TOTP_SKEW: u8 = 1;
const TOTP_STEP: u64 = 30;

/// A freshly generated TOTP key pending authenticator enrollment.
///
/// Only the base32 secret is persisted; the provisioning URL and the QR
/// enrollment image are derived on demand.
pub struct TotpKey {
    totp: TOTP,
}

impl TotpKey {
    /// Generate a new random shared secret bound to `issuer` / `account_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if secret generation or TOTP construction fails.
    pub fn generate(issuer: &str, account_name: &str) -> Result<Self> {
        let secret = Secret::generate_secret();
        let secret_bytes = secret
            .to_bytes()
            .map_err(|err| anyhow!("secret generation error: {err:?}"))?;

        let totp = TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP,
            secret_bytes,
            Some(issuer.to_string()),
            account_name.to_string(),
        )
        .map_err(|err| anyhow!("TOTP init error: {err}"))?;

        Ok(Self { totp })
    }

    /// The base32-encoded shared secret, as persisted on the user record.
    #[must_use]
    pub fn secret_base32(&self) -> String {
        self.totp.get_secret_base32()
    }

    /// The `otpauth://` provisioning URL embedding issuer and account name.
    #[must_use]
    pub fn provisioning_url(&self) -> String {
        self.totp.get_url()
    }

    /// The provisioning URL rendered as a scannable PNG, as a data URL.
    ///
    /// # Errors
    ///
    /// Returns an error if QR rendering fails.
    pub fn qr_data_url(&self) -> Result<String> {
        let qr = self
            .totp
            .get_qr_base64()
            .map_err(|err| anyhow!("QR gen error: {err}"))?;
        Ok(format!("data:image/png;base64,{qr}"))
    }
}

/// Check a submitted code against the current time step.
///
/// One step of clock skew is tolerated on either side. Invalid secrets and
/// clock failures validate as `false`.
#[must_use]
pub fn validate_code(secret_base32: &str, code: &str) -> bool {
    let Ok(secret_bytes) = Secret::Encoded(secret_base32.to_string()).to_bytes() else {
        return false;
    };
    let Ok(totp) = TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW,
        TOTP_STEP,
        secret_bytes,
        None,
        "user".to_string(),
    ) else {
        return false;
    };
    totp.check_current(code).unwrap_or(false)
}
