//! Auth flow controller.
//!
//! State machine per login attempt:
//! `ANONYMOUS -> PASSWORD_VERIFIED -> (TOTP_REQUIRED | TOTP_SETUP_REQUIRED) -> AUTHENTICATED`.
//! A session exists only in the final state: it is minted by `verify_totp`
//! and nowhere else. Registration and the password step of login both answer
//! without a cookie.

pub mod login;
pub mod register;
pub mod reset;
pub mod session;
pub mod state;
mod storage;
pub mod totp;
pub mod types;
mod utils;

pub use login::login;
pub use register::register;
pub use reset::{recover_password, request_password_reset, reset_password};
pub use session::{logout, me};
pub use state::{AuthConfig, AuthState};
pub use totp::{setup_totp, verify_totp};
