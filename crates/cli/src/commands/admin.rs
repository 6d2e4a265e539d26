//! Admin account management.
//!
//! # Usage
//!
//! ```bash
//! vt-cli admin create -e admin@example.com -p 'long passphrase' --phone +380501234567
//! ```
//!
//! Creating an admin for an email that already has an account promotes that
//! account and resets its password.

use thiserror::Error;

use vitrina_core::{Email, PhoneNumber};
use vitrina_storefront::db::{self, RepositoryError};
use vitrina_storefront::db::users::{NewAccount, UserRepository};
use vitrina_storefront::services::auth::{AuthError, hash_password, validate_password};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Command-line fields of a new admin.
#[derive(Debug)]
pub struct AdminAccount<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: &'a str,
}

/// Create an admin account, or promote the account that owns the email.
///
/// # Errors
///
/// Returns an error for an invalid email, phone or password, or when the
/// database operation fails.
pub async fn create_user(account: &AdminAccount<'_>) -> Result<(), AdminError> {
    let email =
        Email::parse(account.email).map_err(|_| AdminError::InvalidEmail(account.email.to_owned()))?;
    let phone = PhoneNumber::parse(account.phone)
        .map_err(|_| AdminError::InvalidPhone(account.phone.to_owned()))?;
    validate_password(account.password)?;
    let password_hash = hash_password(account.password)?;

    let database_url = super::database_url().map_err(AdminError::MissingEnvVar)?;
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    let user = UserRepository::new(&pool)
        .upsert_admin(&NewAccount {
            first_name: account.first_name,
            last_name: account.last_name,
            email: &email,
            phone_number: &phone,
            password_hash: &password_hash,
            is_admin: true,
        })
        .await?;

    tracing::info!("Admin ready! ID: {}, Email: {}", user.id, user.email);
    Ok(())
}
