//! Order repository.
//!
//! Placement runs inside the checkout transaction, so those functions take a
//! connection. Status transitions driven by payment webhooks are plain sets
//! and can be replayed safely. They read the row under a lock first and
//! leave closed orders (canceled, expired, received) untouched.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use vitrina_core::{OrderId, OrderStatus, Price, ProductId, UserId};

use super::{DomainError, RepositoryError, constraint_error, page_window};
use crate::models::{NewOrder, Order, Pagination};

/// An order line with the unit price captured at placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub product: ProductId,
    pub quantity: i32,
    pub unit_price: Price,
}

/// Payment session fields stored on a pay-now order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    pub id: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct LockedOrderRow {
    status: OrderStatus,
    payment_time: Option<DateTime<Utc>>,
}

/// Outcome of a webhook-driven status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The order exists but its status does not admit the change.
    Skipped(OrderStatus),
    NotFound,
}

/// Insert an order and its lines.
///
/// # Errors
///
/// Returns `DomainError::MissingReference` if a product vanished meanwhile.
pub async fn insert(
    conn: &mut PgConnection,
    user: UserId,
    order: &NewOrder,
    lines: &[PricedLine],
    region: Option<&str>,
) -> Result<OrderId, RepositoryError> {
    let id: OrderId = sqlx::query_scalar(
        "INSERT INTO orders (user_id, delivery_type, address, payment_type, region) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(user)
    .bind(order.delivery_type)
    .bind(order.shipping_address())
    .bind(order.payment_type)
    .bind(region)
    .fetch_one(&mut *conn)
    .await?;

    let products: Vec<ProductId> = lines.iter().map(|line| line.product).collect();
    let quantities: Vec<i32> = lines.iter().map(|line| line.quantity).collect();
    let prices: Vec<i64> = lines.iter().map(|line| line.unit_price.minor_units()).collect();

    sqlx::query(
        "INSERT INTO order_content (order_id, product_id, quantity, price) \
         SELECT $1, * FROM UNNEST($2::int4[], $3::int4[], $4::int8[])",
    )
    .bind(id)
    .bind(&products)
    .bind(&quantities)
    .bind(&prices)
    .execute(&mut *conn)
    .await
    .map_err(constraint_error)?;

    Ok(id)
}

/// Store the payment session of a pay-now order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn attach_payment_session(
    conn: &mut PgConnection,
    order: OrderId,
    session: &PaymentSession,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE orders SET payment_session_id = $2, checkout_url = $3, payment_expires_at = $4 \
         WHERE id = $1",
    )
    .bind(order)
    .bind(&session.id)
    .bind(&session.url)
    .bind(session.expires_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Repository for order reads and transitions.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
    page_size: u32,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool, page_size: u32) -> Self {
        Self { pool, page_size }
    }

    /// One page of a user's orders, newest first, with totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn page(&self, user: UserId, page: u32) -> Result<Vec<Order>, RepositoryError> {
        let (limit, offset) = page_window(page, self.page_size);
        let orders = sqlx::query_as::<_, Order>(
            "SELECT o.id, o.status, o.delivery_type, o.address, o.payment_type, \
                    o.created_at, o.payment_time, \
                    CASE WHEN o.status = 'processing' AND o.payment_time IS NULL \
                         THEN o.checkout_url END AS checkout_url, \
                    COALESCE(SUM(oc.quantity * oc.price), 0)::int8 AS total, \
                    COALESCE(SUM(oc.quantity), 0)::int8 AS items \
             FROM orders AS o \
             LEFT JOIN order_content AS oc ON oc.order_id = o.id \
             WHERE o.user_id = $1 \
             GROUP BY o.id \
             ORDER BY o.created_at DESC, o.id DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(user)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }

    /// Order count of a user and the position of `page` within it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn total(&self, user: UserId, page: u32) -> Result<Pagination, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user)
            .fetch_one(self.pool)
            .await?;
        Ok(Pagination::new(total, page.max(1), self.page_size))
    }

    /// Mark an order paid at `paid_at`.
    ///
    /// Skipped when the order is already closed; a replay on a confirmed
    /// order rewrites the same values.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self))]
    pub async fn confirm(
        &self,
        order: OrderId,
        paid_at: DateTime<Utc>,
    ) -> Result<Transition, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(row) = lock_order(&mut *tx, order).await? else {
            return Ok(Transition::NotFound);
        };
        if !row.status.accepts_payment() {
            return Ok(Transition::Skipped(row.status));
        }

        sqlx::query("UPDATE orders SET status = 'confirmed', payment_time = $2 WHERE id = $1")
            .bind(order)
            .bind(paid_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Transition::Applied)
    }

    /// Mark an unpaid `processing` order expired.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self))]
    pub async fn expire(&self, order: OrderId) -> Result<Transition, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(row) = lock_order(&mut *tx, order).await? else {
            return Ok(Transition::NotFound);
        };
        if row.payment_time.is_some() || !row.status.can_expire() {
            return Ok(Transition::Skipped(row.status));
        }

        sqlx::query("UPDATE orders SET status = 'expired' WHERE id = $1")
            .bind(order)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Transition::Applied)
    }

    /// Cancel the caller's order.
    ///
    /// The row is locked for the duration of the check, so a concurrent
    /// payment confirmation either lands first (and the cancel is rejected)
    /// or waits for the cancel to commit.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CannotCancel` when the order is not the
    /// caller's, is already paid, or is past `processing`/`confirmed`.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user: UserId, order: OrderId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LockedOrderRow>(
            "SELECT status, payment_time FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(order)
        .bind(user)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DomainError::CannotCancel("order not found".to_owned()))?;

        row.status
            .check_cancellation(row.payment_time.as_ref())
            .map_err(|reason| DomainError::CannotCancel(reason.to_string()))?;

        sqlx::query("UPDATE orders SET status = 'canceled' WHERE id = $1")
            .bind(order)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(order_id = %order, "Order canceled");
        Ok(())
    }
}

/// Read an order's status and payment time, locking the row until the
/// transaction ends.
async fn lock_order(
    conn: &mut PgConnection,
    order: OrderId,
) -> Result<Option<LockedOrderRow>, RepositoryError> {
    let row = sqlx::query_as::<_, LockedOrderRow>(
        "SELECT status, payment_time FROM orders WHERE id = $1 FOR UPDATE",
    )
    .bind(order)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}
