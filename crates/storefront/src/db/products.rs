//! Product repository.
//!
//! Reads go through [`ProductQueryBuilder`]; every statement it renders
//! returns [`ProductRow`]s, which are reshaped here into nested [`Product`]
//! aggregates. Writes replace a product's translations, facet assignments and
//! images wholesale inside one transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use vitrina_core::{CategoryId, FilterId, FilterVariantId, Language, Price, ProductId};

use super::categories::CategoryRepository;
use super::{DomainError, RepositoryError, constraint_error, is_foreign_key_violation};
use crate::config::CatalogSettings;
use crate::models::product::{FacetLabel, ProductFacet, ProductFilterValue, ProductImage, ProductText};
use crate::models::{
    Crumb, NewProduct, Product, ProductDetail, ProductRoute, ProductsPage, ProductsRequest,
};
use crate::query::{ProductQueryBuilder, Select};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Title and description of one language inside the translations object.
#[derive(Debug, Clone, serde::Deserialize)]
struct ProductTextRow {
    title: Option<String>,
    description: Option<String>,
}

/// Flat row shared by every product statement.
///
/// Images and facet values arrive as JSON arrays aggregated per product.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    slug: String,
    price: Price,
    category_id: CategoryId,
    created_at: DateTime<Utc>,
    title: Option<String>,
    description: Option<String>,
    translations: Option<Json<BTreeMap<String, ProductTextRow>>>,
    images: Option<Json<Vec<ProductImage>>>,
    filters: Option<Json<Vec<ProductFilterValue>>>,
    rating: f64,
    reviews: i64,
}

impl ProductRow {
    /// Nest the row into a `Product`.
    ///
    /// With `all_languages` the per-language map is always present (possibly
    /// empty); otherwise it is omitted. Unknown language keys are skipped.
    fn into_product(self, all_languages: bool) -> Product {
        let translations = all_languages.then(|| {
            self.translations
                .map(|Json(map)| map)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|(code, text)| match code.parse::<Language>() {
                    Ok(lang) => Some((
                        lang,
                        ProductText {
                            title: text.title.unwrap_or_default(),
                            description: text.description.unwrap_or_default(),
                        },
                    )),
                    Err(e) => {
                        tracing::warn!(product_id = %self.id, error = %e, "Skipping translation");
                        None
                    }
                })
                .collect()
        });

        Product {
            id: self.id,
            slug: self.slug,
            price: self.price,
            category_id: self.category_id,
            created_at: self.created_at,
            title: self.title,
            description: self.description,
            translations,
            images: self.images.map(|Json(images)| images).unwrap_or_default(),
            filters: self.filters.map(|Json(filters)| filters).unwrap_or_default(),
            rating: self.rating,
            reviews: self.reviews,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FacetRow {
    filter_id: FilterId,
    filter_slug: String,
    filter_title: Option<String>,
    variant_id: FilterVariantId,
    variant_slug: String,
    variant_title: Option<String>,
}

impl From<FacetRow> for ProductFacet {
    fn from(row: FacetRow) -> Self {
        Self {
            filter: FacetLabel {
                id: row.filter_id,
                slug: row.filter_slug,
                title: row.filter_title,
            },
            variant: FacetLabel {
                id: row.variant_id,
                slug: row.variant_slug,
                title: row.variant_title,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductCrumbRow {
    category_id: CategoryId,
    slug: String,
    title: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
    queries: ProductQueryBuilder,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool, settings: CatalogSettings) -> Self {
        Self {
            pool,
            queries: ProductQueryBuilder::new(settings),
        }
    }

    /// One page of products plus the pagination summary.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, request), fields(page = request.page, facets = request.facets.len()))]
    pub async fn list(&self, request: &ProductsRequest) -> Result<ProductsPage, RepositoryError> {
        let products = self
            .fetch(self.queries.listing(request), request.with_translations)
            .await?;

        let count = self.queries.count(request).render()?;
        tracing::debug!(sql = %count.sql, params = count.params.len(), "Product count");
        let total = sqlx::query_scalar_with::<_, i64, _>(&count.sql, count.arguments()?)
            .fetch_one(self.pool)
            .await?;

        Ok(ProductsPage {
            products,
            pagination: self.queries.pagination(request, total),
        })
    }

    /// Products with the given ids, unpaginated, in the request language.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn by_ids(
        &self,
        ids: Vec<ProductId>,
        lang: Language,
    ) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let request = ProductsRequest::by_ids(ids, lang);
        self.fetch(self.queries.listing(&request), false).await
    }

    /// Product page by slug, with labelled facets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown slug.
    #[instrument(skip(self))]
    pub async fn get_by_slug(
        &self,
        slug: &str,
        lang: Language,
        with_translations: bool,
    ) -> Result<ProductDetail, RepositoryError> {
        let product = self
            .fetch(self.queries.detail(slug, lang, with_translations), with_translations)
            .await?
            .into_iter()
            .next()
            .ok_or(RepositoryError::NotFound)?;

        let facets = sqlx::query_as::<_, FacetRow>(
            "SELECT f.id AS filter_id, f.slug AS filter_slug, ft.content AS filter_title, \
                    v.id AS variant_id, v.slug AS variant_slug, vt.content AS variant_title \
             FROM product_filters AS pf \
             JOIN filter_variants AS v ON v.id = pf.variant_id \
             JOIN filters AS f ON f.id = v.filter_id \
             LEFT JOIN translations AS ft ON ft.item_id = f.title_translation_item AND ft.lang = $2 \
             LEFT JOIN translations AS vt ON vt.item_id = v.title_translation_item AND vt.lang = $2 \
             WHERE pf.product_id = $1 \
             ORDER BY f.id, v.position, v.id",
        )
        .bind(product.id)
        .bind(lang)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(ProductFacet::from)
        .collect();

        Ok(ProductDetail { product, facets })
    }

    /// Breadcrumb of the product's category followed by the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown slug.
    #[instrument(skip(self))]
    pub async fn route(&self, slug: &str, lang: Language) -> Result<ProductRoute, RepositoryError> {
        let row = sqlx::query_as::<_, ProductCrumbRow>(
            "SELECT p.category_id, p.slug, pt.title FROM products AS p \
             LEFT JOIN product_translations AS pt ON pt.product_id = p.id AND pt.lang = $2 \
             WHERE p.slug = $1",
        )
        .bind(slug)
        .bind(lang)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let categories = CategoryRepository::new(self.pool)
            .ancestry(row.category_id, lang)
            .await?;

        Ok(ProductRoute {
            categories,
            product: Crumb {
                slug: row.slug,
                title: row.title,
            },
        })
    }

    /// Best sellers, optionally within a category subtree.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn popular(
        &self,
        category: Option<CategoryId>,
        lang: Language,
    ) -> Result<Vec<Product>, RepositoryError> {
        self.fetch(self.queries.popular(category, lang), false).await
    }

    /// Most recently ordered products, optionally from one region.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn recent(
        &self,
        region: Option<&str>,
        lang: Language,
    ) -> Result<Vec<Product>, RepositoryError> {
        self.fetch(self.queries.recent(region, lang), false).await
    }

    /// Create a product with its translations, facets and images.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug (or an image id) is
    /// taken and `DomainError::MissingReference` for an unknown category or
    /// variant. Nothing is persisted on error.
    #[instrument(skip(self, product), fields(slug = %product.slug))]
    pub async fn create(&self, product: &NewProduct) -> Result<ProductId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: ProductId = sqlx::query_scalar(
            "INSERT INTO products (slug, price, category_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&product.slug)
        .bind(product.price)
        .bind(product.category_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(constraint_error)?;

        write_contents(&mut tx, id, product).await?;

        tx.commit().await?;
        tracing::info!(product_id = %id, "Product created");
        Ok(id)
    }

    /// Replace every field and child row of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist, plus
    /// the errors of [`Self::create`].
    #[instrument(skip(self, product))]
    pub async fn replace(&self, id: ProductId, product: &NewProduct) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, ProductId>(
            "UPDATE products SET slug = $2, price = $3, category_id = $4 WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(&product.slug)
        .bind(product.price)
        .bind(product.category_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(constraint_error)?
        .ok_or(RepositoryError::NotFound)?;

        for table in ["product_translations", "product_filters", "product_images"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE product_id = $1"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        write_contents(&mut tx, id, product).await?;

        tx.commit().await?;
        tracing::info!(product_id = %id, "Product replaced");
        Ok(())
    }

    /// Hard-delete a product; images, facets and reviews cascade.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist and
    /// `DomainError::ProductInUse` once it appears in an order.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query_scalar::<_, ProductId>("DELETE FROM products WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    return RepositoryError::Domain(DomainError::ProductInUse);
                }
                RepositoryError::Database(e)
            })?
            .ok_or(RepositoryError::NotFound)?;
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Render, run and reshape a product statement.
    async fn fetch(&self, select: Select, all_languages: bool) -> Result<Vec<Product>, RepositoryError> {
        let rendered = select.render()?;
        tracing::debug!(sql = %rendered.sql, params = rendered.params.len(), "Product query");

        let rows = sqlx::query_as_with::<_, ProductRow, _>(&rendered.sql, rendered.arguments()?)
            .fetch_all(self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_product(all_languages))
            .collect())
    }
}

/// Insert translations, facet assignments and images of a product.
async fn write_contents(
    conn: &mut PgConnection,
    id: ProductId,
    product: &NewProduct,
) -> Result<(), RepositoryError> {
    for lang in Language::ALL {
        sqlx::query(
            "INSERT INTO product_translations (product_id, lang, title, description) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(lang)
        .bind(product.title.get(lang))
        .bind(product.description.get(lang))
        .execute(&mut *conn)
        .await?;
    }

    if !product.filters.is_empty() {
        sqlx::query(
            "INSERT INTO product_filters (product_id, variant_id) \
             SELECT $1, UNNEST($2::int4[]) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(&product.filters)
        .execute(&mut *conn)
        .await
        .map_err(constraint_error)?;
    }

    for (position, image) in (0_i32..).zip(&product.images) {
        sqlx::query(
            "INSERT INTO product_images (id, product_id, image_url, width, height, position) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(image.id)
        .bind(id)
        .bind(&image.image_url)
        .bind(image.width)
        .bind(image.height)
        .bind(position)
        .execute(&mut *conn)
        .await
        .map_err(constraint_error)?;
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn row() -> ProductRow {
        ProductRow {
            id: ProductId::new(1),
            slug: "linen-dress".into(),
            price: Price::from_minor(129_900).unwrap(),
            category_id: CategoryId::new(2),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            title: Some("Linen dress".into()),
            description: None,
            translations: None,
            images: Some(Json(vec![ProductImage {
                id: Uuid::nil(),
                image_url: "https://cdn.example/1.jpg".into(),
                width: 800,
                height: 1200,
            }])),
            filters: Some(Json(vec![ProductFilterValue {
                id: FilterVariantId::new(10),
                filter_id: FilterId::new(1),
                slug: "red".into(),
                variant: Some("Red".into()),
            }])),
            rating: 4.5,
            reviews: 2,
        }
    }

    #[test]
    fn test_resolved_row_keeps_nulls() {
        let product = row().into_product(false);
        assert_eq!(product.title.as_deref(), Some("Linen dress"));
        assert_eq!(product.description, None);
        assert!(product.translations.is_none());
        assert_eq!(product.images.len(), 1);
        assert_eq!(product.filters[0].variant.as_deref(), Some("Red"));
    }

    #[test]
    fn test_all_languages_map() {
        let translations: BTreeMap<String, ProductTextRow> = serde_json::from_str(
            r#"{"en": {"title": "Dress", "description": null},
                "ua": {"title": "Сукня", "description": "Льон"},
                "xx": {"title": "?", "description": "?"}}"#,
        )
        .unwrap();
        let product = ProductRow {
            title: None,
            translations: Some(Json(translations)),
            ..row()
        }
        .into_product(true);

        let map = product.translations.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&Language::En].title, "Dress");
        assert_eq!(map[&Language::En].description, "");
        assert_eq!(map[&Language::Ua].description, "Льон");
    }

    #[test]
    fn test_missing_aggregates_become_empty() {
        let product = ProductRow {
            images: None,
            filters: None,
            translations: None,
            ..row()
        }
        .into_product(true);
        assert!(product.images.is_empty());
        assert!(product.filters.is_empty());
        assert_eq!(product.translations, Some(BTreeMap::new()));
    }

    #[test]
    fn test_facet_row_labels() {
        let facet = ProductFacet::from(FacetRow {
            filter_id: FilterId::new(1),
            filter_slug: "color".into(),
            filter_title: Some("Колір".into()),
            variant_id: FilterVariantId::new(3),
            variant_slug: "red".into(),
            variant_title: None,
        });
        assert_eq!(facet.filter.slug, "color");
        assert_eq!(facet.variant.id, FilterVariantId::new(3));
        assert_eq!(facet.variant.title, None);
    }
}
