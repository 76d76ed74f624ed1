//! Database helpers for the auth flows.
//!
//! The user store is external: every access goes through a parameterized
//! query against the `users` table, and each query runs inside a `db.query`
//! tracing span.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

/// Outcome when inserting a new user row.
#[derive(Debug)]
pub(super) enum InsertOutcome {
    Created { user_id: Uuid },
    Conflict,
}

/// Fields needed to check a password at login.
pub(super) struct CredentialRecord {
    pub(super) user_id: Uuid,
    pub(super) username: String,
    pub(super) password_hash: String,
    pub(super) totp_enabled: bool,
}

/// Fields needed by TOTP setup and verification.
pub(super) struct TotpRecord {
    pub(super) user_id: Uuid,
    pub(super) username: String,
    pub(super) totp_secret: Option<String>,
    pub(super) totp_enabled: bool,
    pub(super) totp_backup_codes: Option<String>,
}

/// Stored profile behind the `me` endpoint.
pub(super) struct ProfileRecord {
    pub(super) user_id: Uuid,
    pub(super) username: String,
    pub(super) email: Option<String>,
    pub(super) totp_enabled: bool,
    pub(super) created_at: DateTime<Utc>,
}

/// Target of an email-token password reset.
pub(super) struct ResetTarget {
    pub(super) user_id: Uuid,
    pub(super) email: String,
}

/// User whose password was rewritten by a reset step.
pub(super) struct ResetUser {
    pub(super) user_id: Uuid,
    pub(super) username: String,
    pub(super) email: Option<String>,
}

/// Fields needed to check recovery credentials.
pub(super) struct RecoveryRecord {
    pub(super) user_id: Uuid,
    pub(super) username: String,
    pub(super) email: Option<String>,
    pub(super) recovery_secret_hash: Option<String>,
}

pub(super) async fn username_exists(pool: &PgPool, username: &str) -> Result<bool> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1) AS taken";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to check username uniqueness")?;
    Ok(row.get("taken"))
}

pub(super) async fn email_exists(pool: &PgPool, email: &str) -> Result<bool> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1) AS taken";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to check email uniqueness")?;
    Ok(row.get("taken"))
}

/// Insert a new user with hashed credentials and recovery material.
///
/// A concurrent duplicate slips past the pre-checks occasionally; the unique
/// constraints report it here as `Conflict`.
pub(super) async fn insert_user(
    pool: &PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
    recovery_uuid: Uuid,
    recovery_secret_hash: &str,
) -> Result<InsertOutcome> {
    let query = r"
        INSERT INTO users
            (username, email, password_hash, recovery_uuid, recovery_secret_hash)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(recovery_uuid)
        .bind(recovery_secret_hash)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertOutcome::Created {
            user_id: row.get("id"),
        }),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

pub(super) async fn lookup_credentials(
    pool: &PgPool,
    username: &str,
) -> Result<Option<CredentialRecord>> {
    let query = r"
        SELECT id, username, password_hash, COALESCE(totp_enabled, FALSE) AS totp_enabled
        FROM users
        WHERE username = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup credentials")?;

    Ok(row.map(|row| CredentialRecord {
        user_id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        totp_enabled: row.get("totp_enabled"),
    }))
}

pub(super) async fn lookup_totp(pool: &PgPool, username: &str) -> Result<Option<TotpRecord>> {
    let query = r"
        SELECT id, username, totp_secret, COALESCE(totp_enabled, FALSE) AS totp_enabled,
               totp_backup_codes
        FROM users
        WHERE username = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup TOTP state")?;

    Ok(row.map(|row| TotpRecord {
        user_id: row.get("id"),
        username: row.get("username"),
        totp_secret: row.get("totp_secret"),
        totp_enabled: row.get("totp_enabled"),
        totp_backup_codes: row.get("totp_backup_codes"),
    }))
}

/// Persist a freshly generated, still-unconfirmed TOTP secret.
///
/// Re-running setup discards any previous unconfirmed enrollment state.
pub(super) async fn store_totp_secret(pool: &PgPool, user_id: Uuid, secret: &str) -> Result<()> {
    let query = r"
        UPDATE users
        SET totp_secret = $2, totp_enabled = FALSE, totp_backup_codes = NULL
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(secret)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store TOTP secret")?;
    Ok(())
}

/// Flip the enabled flag and store the hashed backup codes in one statement,
/// so a failure leaves neither behind.
pub(super) async fn enable_totp(
    pool: &PgPool,
    user_id: Uuid,
    backup_codes_json: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET totp_enabled = TRUE, totp_backup_codes = $2
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(backup_codes_json)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to enable TOTP")?;
    Ok(())
}

/// Persist the shrunken backup-code array after one code was consumed.
pub(super) async fn update_backup_codes(
    pool: &PgPool,
    user_id: Uuid,
    backup_codes_json: &str,
) -> Result<()> {
    let query = "UPDATE users SET totp_backup_codes = $2 WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(backup_codes_json)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update backup codes")?;
    Ok(())
}

pub(super) async fn lookup_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<ProfileRecord>> {
    let query = r"
        SELECT id, username, email, COALESCE(totp_enabled, FALSE) AS totp_enabled, created_at
        FROM users
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup profile")?;

    Ok(row.map(|row| ProfileRecord {
        user_id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        totp_enabled: row.get("totp_enabled"),
        created_at: row.get("created_at"),
    }))
}

pub(super) async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<ResetTarget>> {
    let query = "SELECT id, email FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;

    Ok(row.map(|row| ResetTarget {
        user_id: row.get("id"),
        email: row.get("email"),
    }))
}

/// Store a reset-token hash with its expiry; any previous token is replaced.
pub(super) async fn store_reset_token(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &[u8],
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET password_reset_token_hash = $2,
            password_reset_expires_at = NOW() + ($3 * INTERVAL '1 second')
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(token_hash)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store reset token")?;
    Ok(())
}

/// Atomically rewrite the password and invalidate the token.
///
/// Matches only an unexpired token hash; expiry and mismatch are
/// indistinguishable to the caller, both come back as `None`.
pub(super) async fn consume_reset_token(
    pool: &PgPool,
    token_hash: &[u8],
    new_password_hash: &str,
) -> Result<Option<ResetUser>> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
            password_reset_token_hash = NULL,
            password_reset_expires_at = NULL
        WHERE password_reset_token_hash = $1
          AND password_reset_expires_at > NOW()
        RETURNING id, username, email
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(new_password_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume reset token")?;

    Ok(row.map(|row| ResetUser {
        user_id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
    }))
}

pub(super) async fn lookup_recovery(
    pool: &PgPool,
    recovery_uuid: Uuid,
) -> Result<Option<RecoveryRecord>> {
    let query = r"
        SELECT id, username, email, recovery_secret_hash
        FROM users
        WHERE recovery_uuid = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(recovery_uuid)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup recovery credentials")?;

    Ok(row.map(|row| RecoveryRecord {
        user_id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        recovery_secret_hash: row.get("recovery_secret_hash"),
    }))
}

pub(super) async fn update_password(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let query = "UPDATE users SET password_hash = $2 WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(())
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }
}
