//! User repository for database operations.
//!
//! Covers accounts, their password hashes and pending password
//! restorations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use vitrina_core::{Email, PhoneNumber, UserId};

use super::{RepositoryError, constraint_error};
use crate::models::user::{Credentials, User};

// =============================================================================
// Internal Row Types
// =============================================================================

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, phone_number, is_admin, created_at, password_hash";

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    first_name: String,
    last_name: String,
    email: String,
    phone_number: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
    password_hash: String,
}

impl TryFrom<UserRow> for Credentials {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let phone_number = PhoneNumber::parse(&row.phone_number).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone number in database: {e}"))
        })?;

        Ok(Self {
            user: User {
                id: row.id,
                first_name: row.first_name,
                last_name: row.last_name,
                email,
                phone_number,
                is_admin: row.is_admin,
                created_at: row.created_at,
            },
            password_hash: row.password_hash,
        })
    }
}

/// A pending password restoration.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Restoration {
    /// SHA-256 of the emailed code, hex encoded.
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
}

/// Fields written by a profile update. `None` leaves a column unchanged.
#[derive(Debug, Default)]
pub struct UserUpdate<'a> {
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub phone_number: Option<&'a PhoneNumber>,
    pub password_hash: Option<&'a str>,
}

/// Account fields for a new user.
#[derive(Debug)]
pub struct NewAccount<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a Email,
    pub phone_number: &'a PhoneNumber,
    pub password_hash: &'a str,
    pub is_admin: bool,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` with the constraint detail if the
    /// email or phone number is taken.
    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn create(&self, account: &NewAccount<'_>) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO users (first_name, last_name, email, phone_number, password_hash, is_admin) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(account.first_name.trim())
            .bind(account.last_name.trim())
            .bind(account.email.as_str())
            .bind(account.phone_number.as_str())
            .bind(account.password_hash)
            .bind(account.is_admin)
            .fetch_one(self.pool)
            .await
            .map_err(constraint_error)?;

        let credentials: Credentials = row.try_into()?;
        Ok(credentials.user)
    }

    /// Create an admin, or promote and re-password an existing account with
    /// the same email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the phone number belongs to
    /// another account.
    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn upsert_admin(&self, account: &NewAccount<'_>) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO users (first_name, last_name, email, phone_number, password_hash, is_admin) \
             VALUES ($1, $2, $3, $4, $5, TRUE) \
             ON CONFLICT (email) DO UPDATE SET is_admin = TRUE, password_hash = EXCLUDED.password_hash \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(account.first_name.trim())
            .bind(account.last_name.trim())
            .bind(account.email.as_str())
            .bind(account.phone_number.as_str())
            .bind(account.password_hash)
            .fetch_one(self.pool)
            .await
            .map_err(constraint_error)?;

        let credentials: Credentials = row.try_into()?;
        Ok(credentials.user)
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if stored contact details are invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .credentials_where("id = $1", id)
            .await?
            .map(|credentials| credentials.user))
    }

    /// Get a user and password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Credentials>, RepositoryError> {
        self.credentials_where("email = $1", email.as_str()).await
    }

    /// Get a user and password hash by phone number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn credentials_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<Credentials>, RepositoryError> {
        self.credentials_where("phone_number = $1", phone.as_str()).await
    }

    /// Get a user and password hash by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn credentials_by_id(&self, id: UserId) -> Result<Option<Credentials>, RepositoryError> {
        self.credentials_where("id = $1", id).await
    }

    async fn credentials_where<T>(
        &self,
        predicate: &str,
        value: T,
    ) -> Result<Option<Credentials>, RepositoryError>
    where
        T: for<'q> sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send,
    {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Apply a profile update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist and
    /// `RepositoryError::Conflict` if the new phone number is taken.
    #[instrument(skip(self, update))]
    pub async fn update(&self, id: UserId, update: &UserUpdate<'_>) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE users SET \
                 first_name = COALESCE($2, first_name), \
                 last_name = COALESCE($3, last_name), \
                 phone_number = COALESCE($4, phone_number), \
                 password_hash = COALESCE($5, password_hash), \
                 updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(update.first_name.map(str::trim))
            .bind(update.last_name.map(str::trim))
            .bind(update.phone_number.map(PhoneNumber::as_str))
            .bind(update.password_hash)
            .fetch_optional(self.pool)
            .await
            .map_err(constraint_error)?
            .ok_or(RepositoryError::NotFound)?;

        let credentials: Credentials = row.try_into()?;
        Ok(credentials.user)
    }

    /// Returns true when an account uses this email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn email_exists(&self, email: &Email) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
            .bind(email.as_str())
            .fetch_one(self.pool)
            .await?;
        Ok(exists)
    }

    /// Returns true when an account uses this phone number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn phone_exists(&self, phone: &PhoneNumber) -> Result<bool, RepositoryError> {
        let exists =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE phone_number = $1)")
                .bind(phone.as_str())
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    // =========================================================================
    // Password restoration
    // =========================================================================

    /// Start (or restart) a restoration with a fresh code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn start_restoration(
        &self,
        user: UserId,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO password_restorations (user_id, code_hash, expires_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE \
             SET code_hash = EXCLUDED.code_hash, expires_at = EXCLUDED.expires_at, \
                 attempts = 0, created_at = now()",
        )
        .bind(user)
        .bind(code_hash)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// The user's pending restoration, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn restoration(&self, user: UserId) -> Result<Option<Restoration>, RepositoryError> {
        let restoration = sqlx::query_as::<_, Restoration>(
            "SELECT code_hash, attempts, expires_at FROM password_restorations WHERE user_id = $1",
        )
        .bind(user)
        .fetch_optional(self.pool)
        .await?;
        Ok(restoration)
    }

    /// Count a failed code check.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn record_failed_attempt(&self, user: UserId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE password_restorations SET attempts = attempts + 1 WHERE user_id = $1")
            .bind(user)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Set a new password and consume the restoration, atomically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a write fails.
    #[instrument(skip(self, password_hash))]
    pub async fn complete_restoration(
        &self,
        user: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user)
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM password_restorations WHERE user_id = $1")
            .bind(user)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
