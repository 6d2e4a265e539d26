//! Order placement.
//!
//! Prices come from the catalog at placement time. The order row, its lines
//! and (for pay-now orders) the payment session are written in one
//! transaction, so a failed session call leaves no order behind.

use std::collections::HashMap;

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use vitrina_core::{Language, PaymentType, ProductId};

use crate::config::CatalogSettings;
use crate::db::orders::{self, PricedLine};
use crate::db::products::ProductRepository;
use crate::db::{DomainError, RepositoryError};
use crate::models::{NewOrder, PlacedOrder, Product, User};
use crate::services::payments::{CheckoutItem, PaymentError, PaymentGateway, SessionRequest};

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl From<DomainError> for CheckoutError {
    fn from(e: DomainError) -> Self {
        Self::Repository(RepositoryError::Domain(e))
    }
}

/// Places orders and opens payment sessions.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    products: ProductRepository<'a>,
    gateway: &'a dyn PaymentGateway,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        settings: CatalogSettings,
        gateway: &'a dyn PaymentGateway,
    ) -> Self {
        Self {
            pool,
            products: ProductRepository::new(pool, settings),
            gateway,
        }
    }

    /// Place an order for `user`.
    ///
    /// # Errors
    ///
    /// Returns the domain error `InvalidOrder` for a malformed order or an
    /// unknown product, `CheckoutError::Payment` if the session cannot be
    /// opened, and repository errors for storage failures.
    #[instrument(skip(self, user, order), fields(user_id = %user.id, lines = order.products.len()))]
    pub async fn place_order(
        &self,
        user: &User,
        order: &NewOrder,
        lang: Language,
        region: Option<&str>,
    ) -> Result<PlacedOrder, CheckoutError> {
        order.validate().map_err(DomainError::InvalidOrder)?;

        let ids = order.products.iter().map(|line| line.id).collect();
        let catalog = self.products.by_ids(ids, lang).await?;
        let (lines, items) = price_lines(order, &catalog)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let id = orders::insert(&mut tx, user.id, order, &lines, region).await?;

        let checkout_url = if order.payment_type == PaymentType::PayNow {
            let session = self
                .gateway
                .create_session(&SessionRequest {
                    order: id,
                    customer_email: user.email.as_str(),
                    items: &items,
                })
                .await?;
            orders::attach_payment_session(&mut tx, id, &session).await?;
            Some(session.url)
        } else {
            None
        };

        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::info!(order_id = %id, "Order placed");
        Ok(PlacedOrder { id, checkout_url })
    }
}

/// Attach catalog prices to the order lines and build the checkout items.
///
/// # Errors
///
/// Returns `DomainError::InvalidOrder` naming the first unknown product.
pub fn price_lines(
    order: &NewOrder,
    catalog: &[Product],
) -> Result<(Vec<PricedLine>, Vec<CheckoutItem>), DomainError> {
    let by_id: HashMap<ProductId, &Product> =
        catalog.iter().map(|product| (product.id, product)).collect();

    let mut lines = Vec::with_capacity(order.products.len());
    let mut items = Vec::with_capacity(order.products.len());
    for line in &order.products {
        let product = by_id
            .get(&line.id)
            .ok_or_else(|| DomainError::InvalidOrder(format!("unknown product {}", line.id)))?;
        let quantity = i32::try_from(line.count)
            .map_err(|_| DomainError::InvalidOrder(format!("bad quantity for {}", line.id)))?;

        lines.push(PricedLine {
            product: product.id,
            quantity,
            unit_price: product.price,
        });
        items.push(CheckoutItem {
            name: product.title.clone().unwrap_or_else(|| product.slug.clone()),
            image_url: product.images.first().map(|image| image.image_url.clone()),
            unit_amount: product.price,
            quantity: line.count,
        });
    }

    Ok((lines, items))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vitrina_core::{CategoryId, DeliveryType, Price};

    use crate::models::OrderLine;

    fn product(id: i32, price: i64, title: Option<&str>) -> Product {
        Product {
            id: ProductId::new(id),
            slug: format!("product-{id}"),
            price: Price::from_minor(price).unwrap(),
            category_id: CategoryId::new(1),
            created_at: Utc::now(),
            title: title.map(str::to_owned),
            description: None,
            translations: None,
            images: Vec::new(),
            filters: Vec::new(),
            rating: 0.0,
            reviews: 0,
        }
    }

    fn order(lines: &[(i32, u32)]) -> NewOrder {
        NewOrder {
            delivery_type: DeliveryType::SelfPickup,
            address: None,
            payment_type: PaymentType::PayNow,
            products: lines
                .iter()
                .map(|&(id, count)| OrderLine {
                    id: ProductId::new(id),
                    count,
                })
                .collect(),
        }
    }

    #[test]
    fn test_lines_take_catalog_prices() {
        let catalog = [product(1, 12_000, Some("Shirt")), product(2, 500, None)];
        let (lines, items) = price_lines(&order(&[(2, 3), (1, 1)]), &catalog).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product, ProductId::new(2));
        assert_eq!(lines[0].quantity, 3);
        assert_eq!(lines[0].unit_price.minor_units(), 500);
        assert_eq!(items[0].name, "product-2");
        assert_eq!(items[1].name, "Shirt");
        assert_eq!(items[1].quantity, 1);
    }

    #[test]
    fn test_unknown_product_is_rejected() {
        let catalog = [product(1, 12_000, Some("Shirt"))];
        let result = price_lines(&order(&[(1, 1), (9, 1)]), &catalog);
        assert_eq!(
            result.unwrap_err(),
            DomainError::InvalidOrder("unknown product 9".to_owned())
        );
    }
}
