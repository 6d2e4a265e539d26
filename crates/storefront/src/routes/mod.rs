//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health, /health/ready         - Liveness and readiness
//!
//! # Catalog
//! GET  /products                      - Listing with facets, search, sort, pages
//! POST /products                      - Create product (admin)
//! GET  /products/popular              - Best sellers, optionally per category
//! GET  /products/recent               - Recently ordered from the caller's region
//! GET  /products/{slug}               - Product page
//! PUT  /products/{id}                 - Replace product (admin)
//! DELETE /products/{id}               - Delete product (admin)
//! GET  /products/{slug}/route         - Breadcrumb
//! GET  /categories                    - Children of ?parentId=, or roots
//! GET  /categories/tree               - Navigation tree
//! GET  /categories/{id}               - Admin view with translations
//! GET  /categories/slug/{slug}/route  - Breadcrumb
//! GET  /categories/{id}/products      - Listing scoped to a category
//! GET  /categories/{id}/filters       - Filters with variants
//! POST/PUT/DELETE categories, filters and variants (admin)
//!
//! # Reviews
//! GET  /products/{id}/reviews         - Page of reviews
//! GET  /products/{id}/reviews/total   - Pagination summary
//! POST/PUT/DELETE /products/{id}/reviews - Caller's own review
//!
//! # Orders (requires auth)
//! GET  /orders, /orders/total         - History
//! POST /orders                        - Place order
//! POST /orders/{id}/cancel            - Cancel order
//! POST /webhook/payments              - Payment processor events
//!
//! # Accounts
//! POST /auth/register, /auth/login, /auth/refresh, /auth/logout
//! POST /auth/restore, /auth/restore/verify, /auth/restore/complete
//! GET  /users/me, PATCH /users/me
//! GET  /users/email-available, /users/phone-available
//! ```

pub mod auth;
pub mod categories;
pub mod filters;
pub mod health;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;
pub mod webhook;

use axum::{
    Router,
    routing::{get, post, put},
};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::{auth_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// `?withTranslations=true` on read endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationsQuery {
    #[serde(default)]
    pub with_translations: bool,
}

/// `?page=N` on paginated endpoints. Defaults to the first page.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: u32,
}

const fn first_page() -> u32 {
    1
}

/// Map a model validation message to a 400.
pub(crate) fn validated(result: Result<(), String>) -> Result<(), AppError> {
    result.map_err(AppError::BadRequest)
}

/// Product and review routes.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/popular", get(products::popular))
        .route("/recent", get(products::recent))
        .route(
            "/{product}",
            get(products::show)
                .put(products::replace)
                .delete(products::delete),
        )
        .route("/{product}/route", get(products::route))
        .route(
            "/{product}/reviews",
            get(reviews::index)
                .post(reviews::create)
                .put(reviews::update)
                .delete(reviews::delete),
        )
        .route("/{product}/reviews/total", get(reviews::total))
}

/// Category routes, including the per-category listing and filters.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index).post(categories::create))
        .route("/tree", get(categories::tree))
        .route(
            "/{id}",
            get(categories::show)
                .put(categories::update)
                .delete(categories::delete),
        )
        .route("/slug/{slug}/route", get(categories::route))
        .route("/{id}/products", get(products::category_index))
        .route(
            "/{id}/filters",
            get(filters::index).post(filters::create),
        )
}

/// Filter and variant admin routes.
pub fn filter_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/filters/{id}",
            put(filters::update).delete(filters::delete),
        )
        .route("/filters/{id}/variants", post(filters::create_variant))
        .route(
            "/variants/{id}",
            put(filters::update_variant).delete(filters::delete_variant),
        )
}

/// Order routes. Placement is rate limited.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(orders::create)
                .layer(checkout_rate_limiter())
                .get(orders::index),
        )
        .route("/total", get(orders::total))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Account routes, all rate limited.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/restore", post(auth::restore))
        .route("/restore/verify", post(auth::restore_verify))
        .route("/restore/complete", post(auth::restore_complete))
        .layer(auth_rate_limiter())
}

/// Profile routes.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(users::me).patch(users::update))
        .route("/email-available", get(users::email_available))
        .route("/phone-available", get(users::phone_available))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .merge(filter_routes())
        .nest("/orders", order_routes())
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .route("/webhook/payments", post(webhook::payments))
}
