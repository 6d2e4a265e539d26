//! Filter facet index repository.

use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use vitrina_core::{CategoryId, FilterId, FilterVariantId, Language, TranslationItemId};

use super::{RepositoryError, constraint_error, translations};
use crate::models::{Filter, FilterVariant, NewFilter, NewFilterVariant, UpdateFilter};

/// One filter joined with one of its variants (or none).
#[derive(Debug, Clone, sqlx::FromRow)]
struct FilterVariantRow {
    filter_id: FilterId,
    category_id: CategoryId,
    filter_slug: String,
    filter_item: TranslationItemId,
    filter_title: Option<String>,
    variant_id: Option<FilterVariantId>,
    variant_slug: Option<String>,
    variant_item: Option<TranslationItemId>,
    variant_title: Option<String>,
}

/// A filter with the translation items behind its titles.
#[derive(Debug)]
struct GroupedFilter {
    filter: Filter,
    item: TranslationItemId,
    /// Parallel to `filter.variants`.
    variant_items: Vec<Option<TranslationItemId>>,
}

/// Collapse ordered filter/variant rows into filters with nested variants.
///
/// Rows must arrive grouped by filter.
fn group_filters(rows: Vec<FilterVariantRow>) -> Vec<GroupedFilter> {
    let mut grouped: Vec<GroupedFilter> = Vec::new();

    for row in rows {
        let starts_new = grouped
            .last()
            .is_none_or(|group| group.filter.id != row.filter_id);
        if starts_new {
            grouped.push(GroupedFilter {
                filter: Filter {
                    id: row.filter_id,
                    category_id: row.category_id,
                    slug: row.filter_slug,
                    title: row.filter_title,
                    translations: None,
                    variants: Vec::new(),
                },
                item: row.filter_item,
                variant_items: Vec::new(),
            });
        }

        if let (Some(group), Some(id), Some(slug)) =
            (grouped.last_mut(), row.variant_id, row.variant_slug)
        {
            group.filter.variants.push(FilterVariant {
                id,
                slug,
                title: row.variant_title,
                translations: None,
            });
            group.variant_items.push(row.variant_item);
        }
    }

    grouped
}

/// Repository for filters and filter variants.
pub struct FilterRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FilterRepository<'a> {
    /// Create a new filter repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Filters of a category with variants in display order.
    ///
    /// With `with_translations`, titles are returned for every language
    /// instead of resolved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn list_for_category(
        &self,
        category: CategoryId,
        lang: Language,
        with_translations: bool,
    ) -> Result<Vec<Filter>, RepositoryError> {
        let rows = sqlx::query_as::<_, FilterVariantRow>(
            "SELECT f.id AS filter_id, f.category_id, f.slug AS filter_slug, \
                    f.title_translation_item AS filter_item, ft.content AS filter_title, \
                    v.id AS variant_id, v.slug AS variant_slug, \
                    v.title_translation_item AS variant_item, vt.content AS variant_title \
             FROM filters AS f \
             LEFT JOIN filter_variants AS v ON v.filter_id = f.id \
             LEFT JOIN translations AS ft ON ft.item_id = f.title_translation_item AND ft.lang = $2 \
             LEFT JOIN translations AS vt ON vt.item_id = v.title_translation_item AND vt.lang = $2 \
             WHERE f.category_id = $1 \
             ORDER BY f.id, v.position, v.id",
        )
        .bind(category)
        .bind(lang)
        .fetch_all(self.pool)
        .await?;

        let grouped = group_filters(rows);
        if !with_translations {
            return Ok(grouped.into_iter().map(|group| group.filter).collect());
        }

        let ids: Vec<TranslationItemId> = grouped
            .iter()
            .flat_map(|group| {
                group
                    .variant_items
                    .iter()
                    .flatten()
                    .copied()
                    .chain(std::iter::once(group.item))
            })
            .collect();
        let titles = translations::load(self.pool, &ids).await?;

        Ok(grouped
            .into_iter()
            .map(|group| {
                let mut filter = group.filter;
                filter.title = None;
                filter.translations = Some(titles.get(&group.item).cloned().unwrap_or_default());
                for (variant, item) in filter.variants.iter_mut().zip(group.variant_items) {
                    variant.title = None;
                    variant.translations =
                        Some(item.and_then(|i| titles.get(&i).cloned()).unwrap_or_default());
                }
                filter
            })
            .collect())
    }

    /// Create a filter and its initial variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken in the
    /// category, `DomainError::MissingReference` for an unknown category.
    #[instrument(skip(self, filter), fields(slug = %filter.slug))]
    pub async fn create_filter(
        &self,
        category: CategoryId,
        filter: &NewFilter,
    ) -> Result<FilterId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let item = translations::create_item(&mut tx, &filter.title).await?;
        let id: FilterId = sqlx::query_scalar(
            "INSERT INTO filters (category_id, slug, title_translation_item) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(category)
        .bind(&filter.slug)
        .bind(item)
        .fetch_one(&mut *tx)
        .await
        .map_err(constraint_error)?;

        for variant in &filter.variants {
            insert_variant(&mut tx, id, variant).await?;
        }

        tx.commit().await?;
        tracing::info!(filter_id = %id, category_id = %category, "Filter created");
        Ok(id)
    }

    /// Update a filter's slug and title.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the filter does not exist.
    #[instrument(skip(self, filter))]
    pub async fn update_filter(
        &self,
        id: FilterId,
        filter: &UpdateFilter,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let item: TranslationItemId = sqlx::query_scalar(
            "UPDATE filters SET slug = $2 WHERE id = $1 RETURNING title_translation_item",
        )
        .bind(id)
        .bind(&filter.slug)
        .fetch_optional(&mut *tx)
        .await
        .map_err(constraint_error)?
        .ok_or(RepositoryError::NotFound)?;
        translations::update_item(&mut tx, item, &filter.title).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete a filter, its variants and their assignments to products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the filter does not exist.
    #[instrument(skip(self))]
    pub async fn delete_filter(&self, id: FilterId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut items: Vec<TranslationItemId> = sqlx::query_scalar(
            "SELECT title_translation_item FROM filter_variants WHERE filter_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let own: TranslationItemId = sqlx::query_scalar(
            "DELETE FROM filters WHERE id = $1 RETURNING title_translation_item",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        items.push(own);
        translations::delete_items(&mut tx, &items).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Append a variant to a filter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken in the filter,
    /// `DomainError::MissingReference` for an unknown filter.
    #[instrument(skip(self, variant), fields(slug = %variant.slug))]
    pub async fn create_variant(
        &self,
        filter: FilterId,
        variant: &NewFilterVariant,
    ) -> Result<FilterVariantId, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let id = insert_variant(&mut tx, filter, variant).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Update a variant's slug and label.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    #[instrument(skip(self, variant))]
    pub async fn update_variant(
        &self,
        id: FilterVariantId,
        variant: &NewFilterVariant,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let item: TranslationItemId = sqlx::query_scalar(
            "UPDATE filter_variants SET slug = $2 WHERE id = $1 RETURNING title_translation_item",
        )
        .bind(id)
        .bind(&variant.slug)
        .fetch_optional(&mut *tx)
        .await
        .map_err(constraint_error)?
        .ok_or(RepositoryError::NotFound)?;
        translations::update_item(&mut tx, item, &variant.title).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete a variant and its assignments to products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    #[instrument(skip(self))]
    pub async fn delete_variant(&self, id: FilterVariantId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let item: TranslationItemId = sqlx::query_scalar(
            "DELETE FROM filter_variants WHERE id = $1 RETURNING title_translation_item",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        translations::delete_items(&mut tx, &[item]).await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Insert a variant at the end of its filter's list.
async fn insert_variant(
    conn: &mut PgConnection,
    filter: FilterId,
    variant: &NewFilterVariant,
) -> Result<FilterVariantId, RepositoryError> {
    let item = translations::create_item(conn, &variant.title).await?;
    let id = sqlx::query_scalar(
        "INSERT INTO filter_variants (filter_id, slug, title_translation_item, position) \
         VALUES ($1, $2, $3, \
                 (SELECT COALESCE(MAX(position) + 1, 0) FROM filter_variants WHERE filter_id = $1)) \
         RETURNING id",
    )
    .bind(filter)
    .bind(&variant.slug)
    .bind(item)
    .fetch_one(&mut *conn)
    .await
    .map_err(constraint_error)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(filter: i32, variant: Option<(i32, &str)>) -> FilterVariantRow {
        FilterVariantRow {
            filter_id: FilterId::new(filter),
            category_id: CategoryId::new(1),
            filter_slug: format!("f{filter}"),
            filter_item: TranslationItemId::new(filter * 100),
            filter_title: Some(format!("Filter {filter}")),
            variant_id: variant.map(|(id, _)| FilterVariantId::new(id)),
            variant_slug: variant.map(|(_, slug)| slug.to_owned()),
            variant_item: variant.map(|(id, _)| TranslationItemId::new(id)),
            variant_title: variant.map(|(_, slug)| slug.to_uppercase()),
        }
    }

    #[test]
    fn test_group_filters_nests_variants_in_order() {
        let grouped = group_filters(vec![
            row(1, Some((10, "red"))),
            row(1, Some((11, "blue"))),
            row(2, None),
            row(3, Some((30, "m"))),
        ]);

        let shape: Vec<(i32, Vec<&str>)> = grouped
            .iter()
            .map(|group| {
                (
                    group.filter.id.as_i32(),
                    group.filter.variants.iter().map(|v| v.slug.as_str()).collect(),
                )
            })
            .collect();
        assert_eq!(
            shape,
            vec![(1, vec!["red", "blue"]), (2, vec![]), (3, vec!["m"])]
        );

        let first = &grouped[0];
        assert_eq!(first.item, TranslationItemId::new(100));
        assert_eq!(
            first.variant_items,
            vec![Some(TranslationItemId::new(10)), Some(TranslationItemId::new(11))]
        );
    }

    #[test]
    fn test_group_filters_empty() {
        assert!(group_filters(Vec::new()).is_empty());
    }
}
