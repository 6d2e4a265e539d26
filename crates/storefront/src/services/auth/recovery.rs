//! Password recovery by emailed code.
//!
//! A restoration stores only the SHA-256 of its six-digit code. Codes are
//! valid for six hours and allow five wrong guesses; requesting a new code
//! while the guesses are used up is refused until the old code expires.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::instrument;

use vitrina_core::{Email, Language};

use super::{AuthError, hash_password, validate_password};
use crate::db::users::{Restoration, UserRepository};
use crate::models::user::Credentials;
use crate::services::email::{EmailService, generate_verification_code};

/// How long an emailed code stays valid.
pub const RESTORATION_TTL: Duration = Duration::hours(6);

/// Wrong guesses allowed per code.
pub const MAX_RESTORATION_ATTEMPTS: i32 = 5;

/// Returned when a code is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorationStatus {
    pub attempts: i32,
    pub max_attempts: i32,
}

/// Drives the request, verify and complete steps.
pub struct RecoveryService<'a> {
    users: UserRepository<'a>,
    email: &'a EmailService,
}

impl<'a> RecoveryService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: &'a EmailService) -> Self {
        Self {
            users: UserRepository::new(pool),
            email,
        }
    }

    /// Email a fresh code to the account owner.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` for an unknown email and
    /// `AuthError::TooManyAttempts` while a locked-out code is still live.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn request(
        &self,
        email: &Email,
        lang: Language,
    ) -> Result<RestorationStatus, AuthError> {
        let credentials = self.account(email).await?;
        let user_id = credentials.user.id;

        if let Some(existing) = self.users.restoration(user_id).await?
            && existing.attempts >= MAX_RESTORATION_ATTEMPTS
            && existing.expires_at > Utc::now()
        {
            return Err(AuthError::TooManyAttempts);
        }

        let code = generate_verification_code();
        self.users
            .start_restoration(user_id, &hash_code(&code), Utc::now() + RESTORATION_TTL)
            .await?;
        self.email.send_restore_code(email.as_str(), &code, lang).await?;

        tracing::info!(user_id = %user_id, "Password restoration started");
        Ok(RestorationStatus {
            attempts: 0,
            max_attempts: MAX_RESTORATION_ATTEMPTS,
        })
    }

    /// Check a code without consuming it. Wrong codes count as attempts.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRestoreCode`, `AuthError::RestoreCodeExpired`
    /// or `AuthError::TooManyAttempts`.
    #[instrument(skip(self, code), fields(email = %email))]
    pub async fn verify(&self, email: &Email, code: &str) -> Result<(), AuthError> {
        let credentials = self.account(email).await?;
        self.check(&credentials, code).await
    }

    /// Check the code, then set the new password and drop the restoration.
    ///
    /// # Errors
    ///
    /// As for [`Self::verify`], plus `AuthError::WeakPassword`.
    #[instrument(skip(self, code, password), fields(email = %email))]
    pub async fn complete(&self, email: &Email, code: &str, password: &str) -> Result<(), AuthError> {
        validate_password(password)?;
        let credentials = self.account(email).await?;
        self.check(&credentials, code).await?;

        let password_hash = hash_password(password)?;
        self.users
            .complete_restoration(credentials.user.id, &password_hash)
            .await?;

        tracing::info!(user_id = %credentials.user.id, "Password restored");
        Ok(())
    }

    async fn account(&self, email: &Email) -> Result<Credentials, AuthError> {
        self.users
            .credentials_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn check(&self, credentials: &Credentials, code: &str) -> Result<(), AuthError> {
        let user_id = credentials.user.id;
        let restoration = self
            .users
            .restoration(user_id)
            .await?
            .ok_or(AuthError::InvalidRestoreCode)?;

        let outcome = check_code(&restoration, code, Utc::now());
        if matches!(outcome, Err(AuthError::InvalidRestoreCode)) {
            self.users.record_failed_attempt(user_id).await?;
        }
        outcome
    }
}

/// Hex SHA-256 of a code as stored in the database.
#[must_use]
pub fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.trim().as_bytes()))
}

/// Decide whether `code` unlocks `restoration` at `now`.
///
/// # Errors
///
/// Lockout is checked first, then expiry, then the code itself.
pub fn check_code(
    restoration: &Restoration,
    code: &str,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    if restoration.attempts >= MAX_RESTORATION_ATTEMPTS {
        return Err(AuthError::TooManyAttempts);
    }
    if restoration.expires_at <= now {
        return Err(AuthError::RestoreCodeExpired);
    }
    if !constant_time_compare(&hash_code(code), &restoration.code_hash) {
        return Err(AuthError::InvalidRestoreCode);
    }
    Ok(())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn restoration(code: &str, attempts: i32, expires_in: Duration) -> Restoration {
        Restoration {
            code_hash: hash_code(code),
            attempts,
            expires_at: Utc::now() + expires_in,
        }
    }

    #[test]
    fn test_hash_code_is_hex_sha256() {
        let hash = hash_code("123456");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_code(" 123456 "));
        assert_ne!(hash, hash_code("123457"));
    }

    #[test]
    fn test_correct_code() {
        let pending = restoration("482913", 0, Duration::hours(1));
        assert!(check_code(&pending, "482913", Utc::now()).is_ok());
    }

    #[test]
    fn test_wrong_code() {
        let pending = restoration("482913", 2, Duration::hours(1));
        assert!(matches!(
            check_code(&pending, "000000", Utc::now()),
            Err(AuthError::InvalidRestoreCode)
        ));
    }

    #[test]
    fn test_expired_code() {
        let pending = restoration("482913", 0, Duration::minutes(-1));
        assert!(matches!(
            check_code(&pending, "482913", Utc::now()),
            Err(AuthError::RestoreCodeExpired)
        ));
    }

    #[test]
    fn test_lockout_wins_over_correct_code() {
        let pending = restoration("482913", MAX_RESTORATION_ATTEMPTS, Duration::hours(1));
        assert!(matches!(
            check_code(&pending, "482913", Utc::now()),
            Err(AuthError::TooManyAttempts)
        ));
    }

    #[test]
    fn test_one_attempt_left() {
        let pending = restoration("482913", MAX_RESTORATION_ATTEMPTS - 1, Duration::hours(1));
        assert!(check_code(&pending, "482913", Utc::now()).is_ok());
    }
}
