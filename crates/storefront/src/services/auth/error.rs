//! Authentication error types.

use thiserror::Error;

use super::tokens::TokenError;
use crate::db::RepositoryError;
use crate::services::email::EmailError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Request body failed validation.
    #[error("{0}")]
    Invalid(String),

    /// Token could not be issued or verified.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// No restoration is pending, or the code does not match.
    #[error("restoration code is invalid")]
    InvalidRestoreCode,

    /// The restoration code is past its validity window.
    #[error("restoration code has expired")]
    RestoreCodeExpired,

    /// Too many wrong codes were entered for this restoration.
    #[error("too many restoration attempts")]
    TooManyAttempts,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// The restoration email could not be sent.
    #[error("email error: {0}")]
    Email(#[from] EmailError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
