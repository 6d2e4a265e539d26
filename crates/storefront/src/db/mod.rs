//! Database operations for the vitrina `PostgreSQL` schema.
//!
//! ## Tables
//!
//! - `translation_items` / `translations` - per-language content
//! - `categories` - self-referencing category tree
//! - `filters` / `filter_variants` - facet index per category
//! - `products`, `product_translations`, `product_images`, `product_filters`
//! - `reviews`
//! - `users`, `password_restorations`
//! - `orders`, `order_content`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p vitrina-cli -- migrate
//! ```

pub mod categories;
pub mod filters;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod translations;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::error::DatabaseError;
use sqlx::postgres::{PgDatabaseError, PgPoolOptions};
use thiserror::Error;

use crate::query::QueryBuildError;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique slug). Carries the constraint detail.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A business rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A statement could not be assembled.
    #[error("query construction failed: {0}")]
    Query(#[from] QueryBuildError),
}

/// Business rules enforced while reading or writing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("order cannot be canceled: {0}")]
    CannotCancel(String),

    #[error("current password is wrong")]
    WrongPassword,

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("category still has products or subcategories")]
    CategoryInUse,

    #[error("product has been ordered and cannot be deleted")]
    ProductInUse,

    #[error("a category cannot be moved under itself")]
    CategoryCycle,

    /// A write pointed at a row that does not exist.
    #[error("missing reference: {0}")]
    MissingReference(String),
}

/// Translate constraint violations into client-facing errors.
///
/// Unique violations become `Conflict` with the server's detail message,
/// foreign-key violations become `MissingReference`.
pub(crate) fn constraint_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(constraint_detail(db_err.as_ref()));
        }
        if db_err.is_foreign_key_violation() {
            return DomainError::MissingReference(constraint_detail(db_err.as_ref())).into();
        }
    }
    RepositoryError::Database(e)
}

/// Returns true when `e` is a foreign-key violation.
pub(crate) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

fn constraint_detail(err: &dyn DatabaseError) -> String {
    err.try_downcast_ref::<PgDatabaseError>()
        .and_then(PgDatabaseError::detail)
        .map_or_else(|| err.message().to_owned(), str::to_owned)
}

/// `LIMIT`/`OFFSET` values for a 1-based page; page 0 reads the first page.
pub(crate) fn page_window(page: u32, page_size: u32) -> (i64, i64) {
    let size = i64::from(page_size.max(1));
    (size, i64::from(page.max(1) - 1) * size)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(1, 10), (10, 0));
        assert_eq!(page_window(3, 10), (10, 20));
        assert_eq!(page_window(0, 10), (10, 0));
    }

    #[test]
    fn test_domain_errors_pass_through() {
        let err: RepositoryError = DomainError::WrongPassword.into();
        assert_eq!(err.to_string(), "current password is wrong");
        assert!(matches!(err, RepositoryError::Domain(DomainError::WrongPassword)));
    }

    #[test]
    fn test_non_database_errors_stay_internal() {
        let err = constraint_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::Database(_)));
        assert!(!is_foreign_key_violation(&sqlx::Error::RowNotFound));
    }
}
