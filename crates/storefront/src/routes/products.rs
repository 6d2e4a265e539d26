//! Product route handlers.

use axum::{
    Json,
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use vitrina_core::{CategoryId, Language, ProductId};

use super::{TranslationsQuery, validated};
use crate::db::products::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::{ClientRegion, RequestLanguage, RequireAdmin};
use crate::models::{NewProduct, Product, ProductDetail, ProductRoute, ProductsPage, ProductsRequest};
use crate::state::AppState;

/// `?categoryId=` on the popular listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularQuery {
    pub category_id: Option<CategoryId>,
}

/// Id of a newly created entity.
#[derive(Debug, Serialize)]
pub struct Created<Id> {
    pub id: Id,
}

fn repository(state: &AppState) -> ProductRepository<'_> {
    ProductRepository::new(state.pool(), state.config().catalog)
}

/// Decode the listing query string. Unknown keys become facet filters.
fn parse_listing(query: Option<&str>, lang: Language) -> Result<ProductsRequest> {
    let pairs = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes());
    ProductsRequest::from_query_pairs(pairs, lang).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Product listing with pagination summary.
pub async fn index(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
    RawQuery(query): RawQuery,
) -> Result<Json<ProductsPage>> {
    let request = parse_listing(query.as_deref(), lang)?;
    Ok(Json(repository(&state).list(&request).await?))
}

/// Listing scoped to one category.
pub async fn category_index(
    State(state): State<AppState>,
    Path(category): Path<CategoryId>,
    RequestLanguage(lang): RequestLanguage,
    RawQuery(query): RawQuery,
) -> Result<Json<ProductsPage>> {
    let mut request = parse_listing(query.as_deref(), lang)?;
    request.category_id = Some(category);
    Ok(Json(repository(&state).list(&request).await?))
}

pub async fn popular(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
    Query(query): Query<PopularQuery>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(repository(&state).popular(query.category_id, lang).await?))
}

pub async fn recent(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
    ClientRegion(region): ClientRegion,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(repository(&state).recent(region.as_deref(), lang).await?))
}

/// Product page by slug.
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    RequestLanguage(lang): RequestLanguage,
    Query(query): Query<TranslationsQuery>,
) -> Result<Json<ProductDetail>> {
    let detail = repository(&state)
        .get_by_slug(&slug, lang, query.with_translations)
        .await?;
    Ok(Json(detail))
}

/// Breadcrumb from the root category to the product.
pub async fn route(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    RequestLanguage(lang): RequestLanguage,
) -> Result<Json<ProductRoute>> {
    Ok(Json(repository(&state).route(&slug, lang).await?))
}

pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(product): Json<NewProduct>,
) -> Result<(StatusCode, Json<Created<ProductId>>)> {
    validated(product.validate())?;
    let id = repository(&state).create(&product).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// Replace every field, translation, facet and image of a product.
pub async fn replace(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(product): Json<NewProduct>,
) -> Result<StatusCode> {
    validated(product.validate())?;
    repository(&state).replace(id, &product).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    repository(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing() {
        let request = parse_listing(Some("page=2&color=red&q=linen"), Language::Ua).unwrap();
        assert_eq!(request.page, 2);
        assert_eq!(request.search.as_deref(), Some("linen"));
        assert_eq!(request.facets.len(), 1);
        assert_eq!(request.language, Language::Ua);
    }

    #[test]
    fn test_parse_listing_without_query() {
        let request = parse_listing(None, Language::En).unwrap();
        assert_eq!(request, ProductsRequest::default());
    }

    #[test]
    fn test_bad_page_is_a_client_error() {
        assert!(matches!(
            parse_listing(Some("page=two"), Language::En),
            Err(AppError::BadRequest(_))
        ));
    }
}
