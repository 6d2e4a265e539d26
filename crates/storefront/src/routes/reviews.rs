//! Product review handlers.
//!
//! Each user holds at most one review per product, so update and delete are
//! addressed by product rather than review id.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use vitrina_core::{ProductId, ReviewId};

use super::products::Created;
use super::{PageQuery, validated};
use crate::db::reviews::ReviewRepository;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{NewReview, Pagination, Review};
use crate::state::AppState;

fn repository(state: &AppState) -> ReviewRepository<'_> {
    ReviewRepository::new(state.pool(), state.config().catalog.reviews_per_page)
}

pub async fn index(
    State(state): State<AppState>,
    Path(product): Path<ProductId>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Review>>> {
    Ok(Json(repository(&state).page(product, query.page).await?))
}

pub async fn total(
    State(state): State<AppState>,
    Path(product): Path<ProductId>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Pagination>> {
    Ok(Json(repository(&state).total(product, query.page).await?))
}

pub async fn create(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Path(product): Path<ProductId>,
    Json(review): Json<NewReview>,
) -> Result<(StatusCode, Json<Created<ReviewId>>)> {
    validated(review.validate())?;
    let id = repository(&state).create(caller.id, product, &review).await?;
    tracing::info!(user_id = %caller.id, product_id = %product, "Review created");
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn update(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Path(product): Path<ProductId>,
    Json(review): Json<NewReview>,
) -> Result<StatusCode> {
    validated(review.validate())?;
    repository(&state).update(caller.id, product, &review).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Path(product): Path<ProductId>,
) -> Result<StatusCode> {
    repository(&state).delete(caller.id, product).await?;
    Ok(StatusCode::NO_CONTENT)
}
