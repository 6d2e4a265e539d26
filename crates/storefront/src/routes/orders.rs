//! Order handlers. Every route requires an access token.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use vitrina_core::OrderId;

use super::PageQuery;
use crate::db::orders::OrderRepository;
use crate::error::Result;
use crate::middleware::{ClientRegion, RequestLanguage, RequireAuth};
use crate::models::{NewOrder, Order, Pagination, PlacedOrder};
use crate::services::auth::AuthService;
use crate::services::checkout::CheckoutService;
use crate::state::AppState;

fn repository(state: &AppState) -> OrderRepository<'_> {
    OrderRepository::new(state.pool(), state.config().catalog.orders_per_page)
}

/// The caller's orders, newest first.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(repository(&state).page(caller.id, query.page).await?))
}

pub async fn total(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Query(query): Query<PageQuery>,
) -> Result<Json<Pagination>> {
    Ok(Json(repository(&state).total(caller.id, query.page).await?))
}

/// Place an order. Pay-now orders come back with a checkout URL.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    RequestLanguage(lang): RequestLanguage,
    ClientRegion(region): ClientRegion,
    Json(order): Json<NewOrder>,
) -> Result<(StatusCode, Json<PlacedOrder>)> {
    let user = AuthService::new(state.pool()).get_user(caller.id).await?;
    let placed = CheckoutService::new(state.pool(), state.config().catalog, state.payments())
        .place_order(&user, &order, lang, region.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<StatusCode> {
    repository(&state).cancel(caller.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
