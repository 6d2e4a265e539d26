//! Facet filter and variant handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use vitrina_core::{CategoryId, FilterId, FilterVariantId};

use super::products::Created;
use super::{TranslationsQuery, validated};
use crate::db::filters::FilterRepository;
use crate::error::Result;
use crate::middleware::{RequestLanguage, RequireAdmin};
use crate::models::{Filter, NewFilter, NewFilterVariant, UpdateFilter};
use crate::state::AppState;

/// Filters of a category, each with its variants.
pub async fn index(
    State(state): State<AppState>,
    Path(category): Path<CategoryId>,
    RequestLanguage(lang): RequestLanguage,
    Query(query): Query<TranslationsQuery>,
) -> Result<Json<Vec<Filter>>> {
    let filters = FilterRepository::new(state.pool())
        .list_for_category(category, lang, query.with_translations)
        .await?;
    Ok(Json(filters))
}

/// Create a filter, optionally with its initial variants.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(category): Path<CategoryId>,
    Json(filter): Json<NewFilter>,
) -> Result<(StatusCode, Json<Created<FilterId>>)> {
    validated(filter.validate())?;
    let id = FilterRepository::new(state.pool())
        .create_filter(category, &filter)
        .await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<FilterId>,
    Json(filter): Json<UpdateFilter>,
) -> Result<StatusCode> {
    validated(filter.validate())?;
    FilterRepository::new(state.pool())
        .update_filter(id, &filter)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a filter together with its variants and product assignments.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<FilterId>,
) -> Result<StatusCode> {
    FilterRepository::new(state.pool()).delete_filter(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_variant(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(filter): Path<FilterId>,
    Json(variant): Json<NewFilterVariant>,
) -> Result<(StatusCode, Json<Created<FilterVariantId>>)> {
    validated(variant.validate())?;
    let id = FilterRepository::new(state.pool())
        .create_variant(filter, &variant)
        .await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn update_variant(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<FilterVariantId>,
    Json(variant): Json<NewFilterVariant>,
) -> Result<StatusCode> {
    validated(variant.validate())?;
    FilterRepository::new(state.pool())
        .update_variant(id, &variant)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_variant(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<FilterVariantId>,
) -> Result<StatusCode> {
    FilterRepository::new(state.pool()).delete_variant(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
