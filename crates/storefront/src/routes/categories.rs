//! Category route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use vitrina_core::CategoryId;

use super::products::Created;
use super::validated;
use crate::db::categories::CategoryRepository;
use crate::error::Result;
use crate::middleware::{RequestLanguage, RequireAdmin};
use crate::models::{Category, CategoryNode, CategoryView, Crumb, NewCategory};
use crate::state::AppState;

/// `?parentId=`; roots when absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildrenQuery {
    pub parent_id: Option<CategoryId>,
}

pub async fn index(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
    Query(query): Query<ChildrenQuery>,
) -> Result<Json<Vec<Category>>> {
    let categories = CategoryRepository::new(state.pool())
        .list(query.parent_id, lang)
        .await?;
    Ok(Json(categories))
}

/// Full navigation tree.
pub async fn tree(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
) -> Result<Json<Vec<CategoryNode>>> {
    Ok(Json(CategoryRepository::new(state.pool()).tree(lang).await?))
}

/// Category with every title translation, for the admin editor.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<Json<CategoryView>> {
    Ok(Json(CategoryRepository::new(state.pool()).get_by_id(id).await?))
}

pub async fn route(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    RequestLanguage(lang): RequestLanguage,
) -> Result<Json<Vec<Crumb>>> {
    Ok(Json(CategoryRepository::new(state.pool()).route(&slug, lang).await?))
}

pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(category): Json<NewCategory>,
) -> Result<(StatusCode, Json<Created<CategoryId>>)> {
    validated(category.validate())?;
    let id = CategoryRepository::new(state.pool()).create(&category).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// Update slug, parent, image and titles. Reparenting under a descendant is
/// rejected.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(category): Json<NewCategory>,
) -> Result<StatusCode> {
    validated(category.validate())?;
    CategoryRepository::new(state.pool()).update(id, &category).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    CategoryRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
