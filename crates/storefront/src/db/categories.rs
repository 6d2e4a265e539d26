//! Category tree repository.

use sqlx::PgPool;
use tracing::instrument;

use vitrina_core::{CategoryId, Language, TranslationItemId};

use super::{DomainError, RepositoryError, constraint_error, is_foreign_key_violation, translations};
use crate::models::{Category, CategoryNode, CategoryView, Crumb, NewCategory};

/// Deepest ancestry walked when building a breadcrumb.
const MAX_DEPTH: i32 = 64;

const CATEGORY_COLUMNS: &str = "SELECT c.id, c.slug, c.parent_id, c.image_url, t.content AS title \
     FROM categories AS c \
     LEFT JOIN translations AS t ON t.item_id = c.title_translation_item AND t.lang = $1";

#[derive(Debug, sqlx::FromRow)]
struct CategoryAdminRow {
    id: CategoryId,
    slug: String,
    parent_id: Option<CategoryId>,
    image_url: Option<String>,
    title_translation_item: TranslationItemId,
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Children of `parent`, or the roots when `parent` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        parent: Option<CategoryId>,
        lang: Language,
    ) -> Result<Vec<Category>, RepositoryError> {
        let sql = format!("{CATEGORY_COLUMNS} WHERE c.parent_id IS NOT DISTINCT FROM $2 ORDER BY c.id");
        let categories = sqlx::query_as::<_, Category>(&sql)
            .bind(lang)
            .bind(parent)
            .fetch_all(self.pool)
            .await?;
        Ok(categories)
    }

    /// The whole navigation tree, assembled from a single query.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn tree(&self, lang: Language) -> Result<Vec<CategoryNode>, RepositoryError> {
        let sql = format!("{CATEGORY_COLUMNS} ORDER BY c.id");
        let categories = sqlx::query_as::<_, Category>(&sql)
            .bind(lang)
            .fetch_all(self.pool)
            .await?;
        Ok(CategoryNode::build_tree(categories))
    }

    /// Admin view with every title translation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: CategoryId) -> Result<CategoryView, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryAdminRow>(
            "SELECT id, slug, parent_id, image_url, title_translation_item FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let mut titles = translations::load(self.pool, &[row.title_translation_item]).await?;

        Ok(CategoryView {
            id: row.id,
            slug: row.slug,
            parent_id: row.parent_id,
            image_url: row.image_url,
            title: titles.remove(&row.title_translation_item).unwrap_or_default(),
        })
    }

    /// Breadcrumb from the root down to the category with `slug`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown slug.
    #[instrument(skip(self))]
    pub async fn route(&self, slug: &str, lang: Language) -> Result<Vec<Crumb>, RepositoryError> {
        let id: CategoryId = sqlx::query_scalar("SELECT id FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        self.ancestry(id, lang).await
    }

    /// Crumbs from the root down to `id`, inclusive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn ancestry(
        &self,
        id: CategoryId,
        lang: Language,
    ) -> Result<Vec<Crumb>, RepositoryError> {
        let crumbs = sqlx::query_as::<_, Crumb>(
            "WITH RECURSIVE chain AS (\
                 SELECT id, parent_id, slug, title_translation_item, 0 AS depth \
                 FROM categories WHERE id = $1 \
                 UNION ALL \
                 SELECT c.id, c.parent_id, c.slug, c.title_translation_item, chain.depth + 1 \
                 FROM categories AS c JOIN chain ON c.id = chain.parent_id \
                 WHERE chain.depth < $3\
             ) \
             SELECT chain.slug, t.content AS title FROM chain \
             LEFT JOIN translations AS t ON t.item_id = chain.title_translation_item AND t.lang = $2 \
             ORDER BY chain.depth DESC",
        )
        .bind(id)
        .bind(lang)
        .bind(MAX_DEPTH)
        .fetch_all(self.pool)
        .await?;

        if crumbs.is_empty() {
            return Err(RepositoryError::NotFound);
        }
        Ok(crumbs)
    }

    /// Create a category with its title translations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    #[instrument(skip(self, category), fields(slug = %category.slug))]
    pub async fn create(&self, category: &NewCategory) -> Result<CategoryId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let item = translations::create_item(&mut tx, &category.title).await?;
        let id: CategoryId = sqlx::query_scalar(
            "INSERT INTO categories (slug, parent_id, image_url, title_translation_item) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&category.slug)
        .bind(category.parent_id)
        .bind(&category.image_url)
        .bind(item)
        .fetch_one(&mut *tx)
        .await
        .map_err(constraint_error)?;

        tx.commit().await?;
        tracing::info!(category_id = %id, "Category created");
        Ok(id)
    }

    /// Replace a category's fields and titles.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist,
    /// `DomainError::CategoryCycle` if the new parent lies inside its subtree,
    /// and `RepositoryError::Conflict` if the slug is taken.
    #[instrument(skip(self, category))]
    pub async fn update(
        &self,
        id: CategoryId,
        category: &NewCategory,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let item: TranslationItemId = sqlx::query_scalar(
            "SELECT title_translation_item FROM categories WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if let Some(parent) = category.parent_id {
            let inside: bool = sqlx::query_scalar(
                "WITH RECURSIVE subtree AS (\
                     SELECT id FROM categories WHERE id = $1 \
                     UNION \
                     SELECT c.id FROM categories AS c JOIN subtree AS s ON c.parent_id = s.id\
                 ) SELECT EXISTS (SELECT 1 FROM subtree WHERE id = $2)",
            )
            .bind(id)
            .bind(parent)
            .fetch_one(&mut *tx)
            .await?;
            if inside {
                return Err(DomainError::CategoryCycle.into());
            }
        }

        sqlx::query("UPDATE categories SET slug = $2, parent_id = $3, image_url = $4 WHERE id = $1")
            .bind(id)
            .bind(&category.slug)
            .bind(category.parent_id)
            .bind(&category.image_url)
            .execute(&mut *tx)
            .await
            .map_err(constraint_error)?;
        translations::update_item(&mut tx, item, &category.title).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete an empty category with its filters and their translations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist and
    /// `DomainError::CategoryInUse` while products or subcategories reference it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut items: Vec<TranslationItemId> = sqlx::query_scalar(
            "SELECT f.title_translation_item FROM filters AS f WHERE f.category_id = $1 \
             UNION ALL \
             SELECT v.title_translation_item FROM filter_variants AS v \
             JOIN filters AS f ON f.id = v.filter_id WHERE f.category_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let own: TranslationItemId = sqlx::query_scalar(
            "DELETE FROM categories WHERE id = $1 RETURNING title_translation_item",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return RepositoryError::Domain(DomainError::CategoryInUse);
            }
            RepositoryError::Database(e)
        })?
        .ok_or(RepositoryError::NotFound)?;

        items.push(own);
        translations::delete_items(&mut tx, &items).await?;

        tx.commit().await?;
        tracing::info!(category_id = %id, "Category deleted");
        Ok(())
    }
}
