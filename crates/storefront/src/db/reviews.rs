//! Product review repository.

use sqlx::PgPool;
use tracing::instrument;

use vitrina_core::{ProductId, ReviewId, UserId};

use super::{RepositoryError, constraint_error, page_window};
use crate::models::{NewReview, Pagination, Review};

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
    page_size: u32,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool, page_size: u32) -> Self {
        Self { pool, page_size }
    }

    /// One page of a product's reviews, newest first.
    ///
    /// A review is verified when its author has a live order containing the
    /// product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn page(&self, product: ProductId, page: u32) -> Result<Vec<Review>, RepositoryError> {
        let (limit, offset) = page_window(page, self.page_size);
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT r.id, r.product_id, r.user_id, u.first_name, u.last_name, \
                    r.rating, r.content, r.created_at, \
                    EXISTS (\
                        SELECT 1 FROM orders AS o \
                        JOIN order_content AS oc ON oc.order_id = o.id \
                        WHERE o.user_id = r.user_id AND oc.product_id = r.product_id \
                          AND o.status NOT IN ('canceled', 'expired')\
                    ) AS is_verified \
             FROM reviews AS r \
             JOIN users AS u ON u.id = r.user_id \
             WHERE r.product_id = $1 \
             ORDER BY r.created_at DESC, r.id DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(product)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(reviews)
    }

    /// Review count of a product and the position of `page` within it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn total(&self, product: ProductId, page: u32) -> Result<Pagination, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE product_id = $1")
            .bind(product)
            .fetch_one(self.pool)
            .await?;
        Ok(Pagination::new(total, page.max(1), self.page_size))
    }

    /// Add the caller's review of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the
    /// product and `DomainError::MissingReference` for an unknown product.
    #[instrument(skip(self, review))]
    pub async fn create(
        &self,
        user: UserId,
        product: ProductId,
        review: &NewReview,
    ) -> Result<ReviewId, RepositoryError> {
        let id = sqlx::query_scalar(
            "INSERT INTO reviews (product_id, user_id, rating, content) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(product)
        .bind(user)
        .bind(review.rating)
        .bind(&review.content)
        .fetch_one(self.pool)
        .await
        .map_err(constraint_error)?;
        Ok(id)
    }

    /// Replace the caller's review of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no review of it.
    #[instrument(skip(self, review))]
    pub async fn update(
        &self,
        user: UserId,
        product: ProductId,
        review: &NewReview,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE reviews SET rating = $3, content = $4, updated_at = now() \
             WHERE product_id = $1 AND user_id = $2",
        )
        .bind(product)
        .bind(user)
        .bind(review.rating)
        .bind(&review.content)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove the caller's review of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no review of it.
    #[instrument(skip(self))]
    pub async fn delete(&self, user: UserId, product: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM reviews WHERE product_id = $1 AND user_id = $2")
            .bind(product)
            .bind(user)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
