//! TOTP engine: shared-secret enrollment, time-step code validation, and
//! single-use backup codes.

pub mod backup;
pub mod engine;

pub use backup::{consume_backup_code, generate_backup_codes, hash_backup_codes};
pub use engine::{validate_code, TotpKey};
