//! Catalog product models and the listing request descriptor.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use vitrina_core::{CategoryId, FilterId, FilterVariantId, Language, Price, ProductId, Translations};

use super::{Pagination, validate_slug};

// =============================================================================
// Listing request
// =============================================================================

/// Query keys with a fixed meaning. Every other key is a facet filter.
pub const RESERVED_QUERY_KEYS: [&str; 6] =
    ["categoryId", "withTranslations", "page", "orderBy", "ids", "q"];

/// Listing sort mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Creation time, newest first.
    #[default]
    New,
    /// Average rating, then review count, highest first.
    Rating,
    /// Price ascending.
    Cheap,
    /// Price descending.
    Expensive,
}

impl SortOrder {
    /// Parse an `orderBy` value. Unknown values sort newest first.
    #[must_use]
    pub fn from_param(value: &str) -> Self {
        match value {
            "rating" => Self::Rating,
            "cheap" => Self::Cheap,
            "expensive" => Self::Expensive,
            "new" => Self::New,
            other => {
                tracing::debug!(order_by = %other, "Unknown sort mode, using newest first");
                Self::New
            }
        }
    }
}

/// Requested facets: filter slug to the variant slugs accepted for it.
///
/// A product matches when it has at least one accepted variant of every
/// listed filter. Ordered maps keep rendering deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetFilters(BTreeMap<String, BTreeSet<String>>);

impl FacetFilters {
    /// Accept `variant` for `filter`.
    pub fn insert(&mut self, filter: impl Into<String>, variant: impl Into<String>) {
        self.0
            .entry(filter.into())
            .or_default()
            .insert(variant.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct filters requested.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `(filter slug, variant slugs)` pairs in slug order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(filter, variants)| (filter.as_str(), variants))
    }
}

impl<F: Into<String>, V: Into<String>> FromIterator<(F, V)> for FacetFilters {
    fn from_iter<I: IntoIterator<Item = (F, V)>>(iter: I) -> Self {
        let mut facets = Self::default();
        for (filter, variant) in iter {
            facets.insert(filter, variant);
        }
        facets
    }
}

/// A query-string value that could not be interpreted.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value for {key}: {value}")]
pub struct ProductsQueryError {
    pub key: &'static str,
    pub value: String,
}

/// Everything the product listing and its counter are built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductsRequest {
    /// Restrict to one category. Ignored when `ids` is non-empty.
    pub category_id: Option<CategoryId>,
    /// Explicit allowlist of products.
    pub ids: Vec<ProductId>,
    /// Free-text search term, matched in `language`.
    pub search: Option<String>,
    pub facets: FacetFilters,
    pub sort: SortOrder,
    pub language: Language,
    /// Return every language's title/description instead of one.
    pub with_translations: bool,
    /// 1-based page; 0 returns every matching product.
    pub page: u32,
}

impl ProductsRequest {
    /// Look up specific products, unpaginated.
    #[must_use]
    pub fn by_ids(ids: Vec<ProductId>, language: Language) -> Self {
        Self {
            ids,
            language,
            ..Self::default()
        }
    }

    /// Build a request from decoded query-string pairs.
    ///
    /// Keys may repeat; `ids` and facet values may also be comma separated.
    /// Blank values are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ProductsQueryError` when `categoryId`, `page` or an `ids`
    /// entry is not an integer.
    pub fn from_query_pairs<'a, I>(pairs: I, language: Language) -> Result<Self, ProductsQueryError>
    where
        I: IntoIterator<Item = (Cow<'a, str>, Cow<'a, str>)>,
    {
        let mut request = Self {
            language,
            ..Self::default()
        };

        for (key, value) in pairs {
            let value = value.trim();
            match key.as_ref() {
                "categoryId" => {
                    if value.is_empty() {
                        continue;
                    }
                    let id = value.parse::<i32>().map_err(|_| ProductsQueryError {
                        key: "categoryId",
                        value: value.to_owned(),
                    })?;
                    request.category_id = Some(CategoryId::new(id));
                }
                "withTranslations" => {
                    request.with_translations = matches!(value, "true" | "1");
                }
                "page" => {
                    if value.is_empty() {
                        continue;
                    }
                    let page = value.parse::<i64>().map_err(|_| ProductsQueryError {
                        key: "page",
                        value: value.to_owned(),
                    })?;
                    request.page = u32::try_from(page.max(0)).unwrap_or(u32::MAX);
                }
                "orderBy" => request.sort = SortOrder::from_param(value),
                "ids" => {
                    for id in split_values(value) {
                        let id = id.parse::<i32>().map_err(|_| ProductsQueryError {
                            key: "ids",
                            value: id.to_owned(),
                        })?;
                        request.ids.push(ProductId::new(id));
                    }
                }
                "q" => {
                    if !value.is_empty() {
                        request.search = Some(value.to_owned());
                    }
                }
                filter => {
                    if filter.is_empty() {
                        continue;
                    }
                    for variant in split_values(value) {
                        request.facets.insert(filter, variant);
                    }
                }
            }
        }

        Ok(request)
    }

    /// The search term, if it has any content.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

fn split_values(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Product aggregates
// =============================================================================

/// Title and description in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductText {
    pub title: String,
    pub description: String,
}

/// A product image, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub id: Uuid,
    pub image_url: String,
    pub width: i32,
    pub height: i32,
}

/// One facet variant assigned to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilterValue {
    pub id: FilterVariantId,
    pub filter_id: FilterId,
    pub slug: String,
    /// Variant label in the request language.
    pub variant: Option<String>,
}

/// A product as returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub price: Price,
    pub category_id: CategoryId,
    pub created_at: DateTime<Utc>,
    /// Resolved title; null when the language has no translation.
    pub title: Option<String>,
    pub description: Option<String>,
    /// Every language, present only when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translations: Option<BTreeMap<Language, ProductText>>,
    pub images: Vec<ProductImage>,
    pub filters: Vec<ProductFilterValue>,
    pub rating: f64,
    pub reviews: i64,
}

/// A listing page with its pagination summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsPage {
    pub products: Vec<Product>,
    #[serde(flatten)]
    pub pagination: Pagination,
}

/// Id, slug and resolved title of a filter or variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetLabel<Id> {
    pub id: Id,
    pub slug: String,
    pub title: Option<String>,
}

/// A filter together with the variant the product has for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductFacet {
    pub filter: FacetLabel<FilterId>,
    pub variant: FacetLabel<FilterVariantId>,
}

/// Product page view: the listing shape plus labelled facets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub facets: Vec<ProductFacet>,
}

/// Slug and title of a category on a breadcrumb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Crumb {
    pub slug: String,
    pub title: Option<String>,
}

/// Breadcrumb from the root category down to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRoute {
    pub categories: Vec<Crumb>,
    pub product: Crumb,
}

// =============================================================================
// Admin writes
// =============================================================================

/// An image to attach to a product. Ids come from the upload service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProductImage {
    pub id: Uuid,
    pub image_url: String,
    pub width: i32,
    pub height: i32,
}

/// Full product contents for create and replace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub slug: String,
    pub price: Price,
    pub category_id: CategoryId,
    pub title: Translations,
    pub description: Translations,
    #[serde(default)]
    pub filters: Vec<FilterVariantId>,
    #[serde(default)]
    pub images: Vec<NewProductImage>,
}

impl NewProduct {
    /// Check field-level rules before touching the database.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first rule violated.
    pub fn validate(&self) -> Result<(), String> {
        validate_slug(&self.slug)?;
        if self.title.has_blank() {
            return Err("title is required in every language".to_owned());
        }
        let mut seen = BTreeSet::new();
        for image in &self.images {
            if image.width <= 0 || image.height <= 0 {
                return Err(format!("image {} has invalid dimensions", image.id));
            }
            if !seen.insert(image.id) {
                return Err(format!("image {} is listed twice", image.id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(query: &str) -> Result<ProductsRequest, ProductsQueryError> {
        ProductsRequest::from_query_pairs(url::form_urlencoded::parse(query.as_bytes()), Language::Ua)
    }

    #[test]
    fn test_reserved_keys_are_not_facets() {
        let request =
            parse("categoryId=4&withTranslations=true&page=2&orderBy=cheap&ids=&q=dress").unwrap();
        assert_eq!(request.category_id, Some(CategoryId::new(4)));
        assert!(request.with_translations);
        assert_eq!(request.page, 2);
        assert_eq!(request.sort, SortOrder::Cheap);
        assert_eq!(request.search.as_deref(), Some("dress"));
        assert!(request.facets.is_empty());
        assert_eq!(request.language, Language::Ua);
    }

    #[test]
    fn test_facets_accumulate_across_repeats_and_commas() {
        let request = parse("color=red&color=blue,green&size=m&size=").unwrap();
        let facets: Vec<_> = request
            .facets
            .iter()
            .map(|(filter, variants)| (filter, variants.iter().cloned().collect::<Vec<_>>()))
            .collect();
        assert_eq!(
            facets,
            vec![
                ("color", vec!["blue".to_owned(), "green".to_owned(), "red".to_owned()]),
                ("size", vec!["m".to_owned()]),
            ]
        );
    }

    #[test]
    fn test_blank_facet_value_adds_nothing() {
        let request = parse("color=&q=%20").unwrap();
        assert!(request.facets.is_empty());
        assert_eq!(request.search_term(), None);
    }

    #[test]
    fn test_ids_parse() {
        let request = parse("ids=3,5&ids=8").unwrap();
        assert_eq!(
            request.ids,
            vec![ProductId::new(3), ProductId::new(5), ProductId::new(8)]
        );
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        assert_eq!(
            parse("categoryId=abc").unwrap_err(),
            ProductsQueryError {
                key: "categoryId",
                value: "abc".to_owned()
            }
        );
        assert!(parse("page=two").is_err());
        assert!(parse("ids=1,x").is_err());
    }

    #[test]
    fn test_negative_page_means_unpaginated() {
        assert_eq!(parse("page=-3").unwrap().page, 0);
    }

    #[test]
    fn test_unknown_sort_defaults_to_new() {
        assert_eq!(parse("orderBy=popularity").unwrap().sort, SortOrder::New);
        assert_eq!(SortOrder::from_param("rating"), SortOrder::Rating);
        assert_eq!(SortOrder::from_param("expensive"), SortOrder::Expensive);
    }

    #[test]
    fn test_new_product_validation() {
        let mut product = NewProduct {
            slug: "linen-dress".to_owned(),
            price: Price::from_minor(150_000).unwrap(),
            category_id: CategoryId::new(1),
            title: Translations {
                en: "Linen dress".to_owned(),
                ua: "Лляна сукня".to_owned(),
            },
            description: Translations::default(),
            filters: vec![],
            images: vec![],
        };
        assert!(product.validate().is_ok());

        product.title.ua = " ".to_owned();
        assert!(product.validate().is_err());

        product.title.ua = "Сукня".to_owned();
        product.slug = "Linen Dress".to_owned();
        assert!(product.validate().is_err());
    }

    #[test]
    fn test_product_serializes_null_title_without_translations() {
        let product = Product {
            id: ProductId::new(1),
            slug: "a".to_owned(),
            price: Price::ZERO,
            category_id: CategoryId::new(1),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            title: None,
            description: None,
            translations: None,
            images: vec![],
            filters: vec![],
            rating: 0.0,
            reviews: 0,
        };
        let json = serde_json::to_value(&product).unwrap();
        assert!(json["title"].is_null());
        assert!(json.get("translations").is_none());
        assert_eq!(json["categoryId"], 1);
    }
}
