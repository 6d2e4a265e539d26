//! Authentication service.
//!
//! Password accounts, JWT access/refresh tokens, signed upload tokens for
//! admins and password recovery by emailed code.

mod error;
pub mod recovery;
pub mod tokens;
pub mod upload;

pub use error::AuthError;
pub use recovery::RecoveryService;
pub use tokens::{TokenError, TokenPair, TokenPayload, TokenService};
pub use upload::UploadToken;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;
use tracing::instrument;

use vitrina_core::{Email, PhoneNumber, UserId};

use crate::db::users::{NewAccount, UserRepository, UserUpdate};
use crate::db::{DomainError, RepositoryError};
use crate::models::user::{LoginId, LoginRequest, NewUser, User, UserPatch};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
///
/// Handles registration, login and profile changes.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new customer account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Invalid` for bad names, `AuthError::WeakPassword`
    /// if the password doesn't meet requirements, and a repository conflict
    /// if the email or phone number is already registered.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: &NewUser) -> Result<User, AuthError> {
        request.validate().map_err(AuthError::Invalid)?;
        validate_password(&request.password)?;

        let password_hash = hash_password(&request.password)?;
        let user = self
            .users
            .create(&NewAccount {
                first_name: &request.first_name,
                last_name: &request.last_name,
                email: &request.email,
                phone_number: &request.phone_number,
                password_hash: &password_hash,
                is_admin: false,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Login with an email or phone number and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the login or password is wrong.
    #[instrument(skip(self, request))]
    pub async fn login(&self, request: &LoginRequest) -> Result<User, AuthError> {
        let credentials = match request.login_id().ok_or(AuthError::InvalidCredentials)? {
            LoginId::Email(email) => self.users.credentials_by_email(&email).await?,
            LoginId::Phone(phone) => self.users.credentials_by_phone(&phone).await?,
        }
        .ok_or(AuthError::InvalidCredentials)?;

        verify_password(&request.password, &credentials.password_hash)?;
        Ok(credentials.user)
    }

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn get_user(&self, id: UserId) -> Result<User, AuthError> {
        self.users.get_by_id(id).await?.ok_or(AuthError::UserNotFound)
    }

    /// Apply a profile patch. A password change must carry the current password.
    ///
    /// # Errors
    ///
    /// Returns the domain error `WrongPassword` when the current password does
    /// not match, `AuthError::WeakPassword` for a short new password and a
    /// repository conflict when the new phone number is taken.
    #[instrument(skip(self, patch))]
    pub async fn update_profile(&self, id: UserId, patch: &UserPatch) -> Result<User, AuthError> {
        patch.validate().map_err(AuthError::Invalid)?;

        let password_hash = match &patch.password {
            Some(change) => {
                let credentials = self
                    .users
                    .credentials_by_id(id)
                    .await?
                    .ok_or(AuthError::UserNotFound)?;
                verify_password(&change.current_password, &credentials.password_hash).map_err(
                    |_| AuthError::Repository(RepositoryError::Domain(DomainError::WrongPassword)),
                )?;
                validate_password(&change.new_password)?;
                Some(hash_password(&change.new_password)?)
            }
            None => None,
        };

        let user = self
            .users
            .update(
                id,
                &UserUpdate {
                    first_name: patch.first_name.as_deref(),
                    last_name: patch.last_name.as_deref(),
                    phone_number: patch.phone_number.as_ref(),
                    password_hash: password_hash.as_deref(),
                },
            )
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })?;
        Ok(user)
    }

    /// Whether an email can still be registered.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    pub async fn email_available(&self, email: &Email) -> Result<bool, AuthError> {
        Ok(!self.users.email_exists(email).await?)
    }

    /// Whether a phone number can still be registered.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    pub async fn phone_available(&self, phone: &PhoneNumber) -> Result<bool, AuthError> {
        Ok(!self.users.phone_exists(phone).await?)
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` for passwords shorter than eight characters.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
