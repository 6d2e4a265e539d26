//! Product listing, counting and strip queries.
//!
//! Listing and count share one scope: the same base relation (raw
//! `products` or the facet-restricted relation) and the same `WHERE`
//! predicates, produced by a single function. Per-product collections
//! (images, facet values, translations, review aggregates) are computed in
//! `LATERAL` subqueries, so each product yields exactly one row and no
//! collection is multiplied by another.

use vitrina_core::{CategoryId, Language};

use super::facets::{FILTERED_PRODUCTS, restricting_ctes};
use super::sql::{Cte, Fragment, Select, SqlParam};
use crate::config::CatalogSettings;
use crate::models::{Pagination, ProductsRequest, SortOrder};

/// Shared parameter holding the language code (`en`, `ua`).
const LANG: &str = "lang";
/// Shared parameter holding the text-search configuration name.
const REGCONFIG: &str = "regconfig";

/// Number of products in the popular and recent strips.
pub const STRIP_LIMIT: i64 = 12;

const RESOLVED_TRANSLATION_JOIN: &str =
    "LEFT JOIN product_translations AS pt ON pt.product_id = p.id AND pt.lang = ";

const ALL_TRANSLATIONS_LATERAL: &str = "LEFT JOIN LATERAL (\
SELECT json_object_agg(t.lang, json_build_object('title', t.title, 'description', t.description) ORDER BY t.lang) AS translations \
FROM product_translations AS t WHERE t.product_id = p.id) AS tr ON TRUE";

const IMAGES_LATERAL: &str = "LEFT JOIN LATERAL (\
SELECT COALESCE(json_agg(json_build_object('id', pi.id, 'imageUrl', pi.image_url, 'width', pi.width, 'height', pi.height) ORDER BY pi.position, pi.id), '[]'::json) AS images \
FROM product_images AS pi WHERE pi.product_id = p.id) AS img ON TRUE";

const FILTER_VALUES_LATERAL: &str = "LEFT JOIN LATERAL (\
SELECT COALESCE(json_agg(json_build_object('id', fv.id, 'filterId', fv.filter_id, 'slug', fv.slug, 'variant', vt.content) ORDER BY fv.filter_id, fv.position, fv.id), '[]'::json) AS filters \
FROM product_filters AS pf \
JOIN filter_variants AS fv ON fv.id = pf.variant_id \
LEFT JOIN translations AS vt ON vt.item_id = fv.title_translation_item AND vt.lang = ";

const REVIEWS_LATERAL: &str = "LEFT JOIN LATERAL (\
SELECT COUNT(*) AS reviews, COALESCE(AVG(r.rating), 0)::float8 AS rating \
FROM reviews AS r WHERE r.product_id = p.id) AS rv ON TRUE";

/// Builds every statement that returns `ProductRow`s.
#[derive(Debug, Clone, Copy)]
pub struct ProductQueryBuilder {
    settings: CatalogSettings,
}

impl ProductQueryBuilder {
    #[must_use]
    pub const fn new(settings: CatalogSettings) -> Self {
        Self { settings }
    }

    /// One page of products matching `request`.
    #[must_use]
    pub fn listing(&self, request: &ProductsRequest) -> Select {
        let mut select = product_select(request.language, request.with_translations);
        apply_scope(&mut select, request);

        for expr in sort_expressions(request.sort) {
            select.order_by(Fragment::sql(*expr));
        }

        if request.page > 0 {
            let size = i64::from(self.settings.products_per_page);
            select.limit(SqlParam::BigInt(size));
            select.offset(SqlParam::BigInt(i64::from(request.page - 1) * size));
        }

        select
    }

    /// Number of products matching `request`, ignoring pagination.
    #[must_use]
    pub fn count(&self, request: &ProductsRequest) -> Select {
        let mut select = Select::default();
        declare_language(&mut select, request.language);
        select.column(Fragment::sql("COUNT(*) AS total"));
        apply_scope(&mut select, request);
        select
    }

    /// Pagination summary for `request` given the count result.
    #[must_use]
    pub fn pagination(&self, request: &ProductsRequest, total: i64) -> Pagination {
        Pagination::new(total, request.page, self.settings.products_per_page)
    }

    /// A single product by slug.
    #[must_use]
    pub fn detail(&self, slug: &str, language: Language, with_translations: bool) -> Select {
        let mut select = product_select(language, with_translations);
        select.filter(Fragment::sql("p.slug = ").bind(SqlParam::Text(slug.to_owned())));
        select
    }

    /// Best sellers, optionally within a category and all its descendants.
    #[must_use]
    pub fn popular(&self, category: Option<CategoryId>, language: Language) -> Select {
        let mut select = product_select(language, false);
        select.with(Cte::fragment(
            "popularity",
            Fragment::sql(
                "SELECT oc.product_id, SUM(oc.quantity) AS sold \
                 FROM order_content AS oc JOIN orders AS o ON o.id = oc.order_id \
                 WHERE o.status NOT IN ('canceled', 'expired') GROUP BY oc.product_id",
            ),
        ));

        if let Some(category) = category {
            select.with(
                Cte::fragment(
                    "subtree",
                    Fragment::sql("SELECT id FROM categories WHERE id = ")
                        .bind(SqlParam::Int(category.as_i32()))
                        .push(
                            " UNION ALL SELECT c.id FROM categories AS c \
                             JOIN subtree AS s ON c.parent_id = s.id",
                        ),
                )
                .columns("id")
                .recursive(),
            );
            select.filter(Fragment::sql("p.category_id IN (SELECT id FROM subtree)"));
        }

        select.join(Fragment::sql(
            "LEFT JOIN popularity AS pop ON pop.product_id = p.id",
        ));
        select.order_by(Fragment::sql("COALESCE(pop.sold, 0) DESC"));
        select.order_by(Fragment::sql("p.id DESC"));
        select.limit(SqlParam::BigInt(STRIP_LIMIT));
        select
    }

    /// Most recently ordered products, optionally from one region.
    #[must_use]
    pub fn recent(&self, region: Option<&str>, language: Language) -> Select {
        let mut recent = Fragment::sql(
            "SELECT oc.product_id, MAX(o.created_at) AS ordered_at \
             FROM order_content AS oc JOIN orders AS o ON o.id = oc.order_id \
             WHERE o.status <> 'canceled'",
        );
        if let Some(region) = region {
            recent = recent
                .push(" AND o.region = ")
                .bind(SqlParam::Text(region.to_owned()));
        }
        recent = recent
            .push(" GROUP BY oc.product_id ORDER BY ordered_at DESC LIMIT ")
            .bind(SqlParam::BigInt(STRIP_LIMIT));

        let mut select = product_select(language, false);
        select.with(Cte::fragment("recent", recent));
        select.join(Fragment::sql("JOIN recent ON recent.product_id = p.id"));
        select.order_by(Fragment::sql("recent.ordered_at DESC"));
        select.order_by(Fragment::sql("p.id DESC"));
        select
    }
}

fn declare_language(select: &mut Select, language: Language) {
    select.share(LANG, SqlParam::Text(language.code().to_owned()));
    select.share(REGCONFIG, SqlParam::Text(language.regconfig().to_owned()));
}

/// Columns and joins of the `ProductRow` shape, reading `products AS p`.
fn product_select(language: Language, all_languages: bool) -> Select {
    let mut select = Select::from(Fragment::sql("products AS p"));
    declare_language(&mut select, language);

    for column in ["p.id", "p.slug", "p.price", "p.category_id", "p.created_at"] {
        select.column(Fragment::sql(column));
    }

    if all_languages {
        select.column(Fragment::sql("NULL::text AS title"));
        select.column(Fragment::sql("NULL::text AS description"));
        select.column(Fragment::sql("tr.translations"));
        select.join(Fragment::sql(ALL_TRANSLATIONS_LATERAL));
    } else {
        select.column(Fragment::sql("pt.title"));
        select.column(Fragment::sql("pt.description"));
        select.column(Fragment::sql("NULL::json AS translations"));
        select.join(Fragment::sql(RESOLVED_TRANSLATION_JOIN).shared(LANG));
    }

    for column in ["img.images", "fa.filters", "rv.rating", "rv.reviews"] {
        select.column(Fragment::sql(column));
    }
    select.join(Fragment::sql(IMAGES_LATERAL));
    select.join(
        Fragment::sql(FILTER_VALUES_LATERAL)
            .shared(LANG)
            .push(" WHERE pf.product_id = p.id) AS fa ON TRUE"),
    );
    select.join(Fragment::sql(REVIEWS_LATERAL));

    select
}

/// Base relation and predicates common to listing and count.
fn apply_scope(select: &mut Select, request: &ProductsRequest) {
    if let Some(ctes) = restricting_ctes(&request.facets) {
        for cte in ctes {
            select.with(cte);
        }
        select.set_from(Fragment::sql(FILTERED_PRODUCTS).push(" AS p"));
    } else {
        select.set_from(Fragment::sql("products AS p"));
    }

    for predicate in scope_predicates(request) {
        select.filter(predicate);
    }
}

fn scope_predicates(request: &ProductsRequest) -> Vec<Fragment> {
    let mut predicates = Vec::new();

    if !request.ids.is_empty() {
        let ids = request.ids.iter().map(|id| id.as_i32()).collect();
        predicates.push(
            Fragment::sql("p.id = ANY(")
                .bind(SqlParam::IntArray(ids))
                .push(")"),
        );
    } else if let Some(category) = request.category_id {
        predicates.push(
            Fragment::sql("p.category_id = ").bind(SqlParam::Int(category.as_i32())),
        );
    }

    if let Some(term) = request.search_term() {
        predicates.push(
            Fragment::sql(
                "EXISTS (SELECT 1 FROM product_translations AS s \
                 WHERE s.product_id = p.id AND s.lang = ",
            )
            .shared(LANG)
            .push(" AND s.search_vector @@ plainto_tsquery(")
            .shared(REGCONFIG)
            .push("::text::regconfig, ")
            .bind(SqlParam::Text(term.to_owned()))
            .push("))"),
        );
    }

    predicates
}

/// Every mode ends on `p.id` so ties never reorder between calls.
const fn sort_expressions(sort: SortOrder) -> &'static [&'static str] {
    match sort {
        SortOrder::New => &["p.created_at DESC", "p.id DESC"],
        SortOrder::Rating => &["rv.rating DESC", "rv.reviews DESC", "p.id DESC"],
        SortOrder::Cheap => &["p.price ASC", "p.id ASC"],
        SortOrder::Expensive => &["p.price DESC", "p.id DESC"],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use vitrina_core::ProductId;

    use super::*;
    use crate::models::FacetFilters;
    use crate::query::RenderedQuery;

    fn builder() -> ProductQueryBuilder {
        ProductQueryBuilder::new(CatalogSettings::default())
    }

    fn listing(request: &ProductsRequest) -> RenderedQuery {
        builder().listing(request).render().unwrap()
    }

    fn count(request: &ProductsRequest) -> RenderedQuery {
        builder().count(request).render().unwrap()
    }

    fn request() -> ProductsRequest {
        ProductsRequest {
            page: 1,
            ..ProductsRequest::default()
        }
    }

    #[test]
    fn test_plain_listing() {
        let rendered = listing(&request());

        assert!(rendered.sql.starts_with(
            "SELECT p.id, p.slug, p.price, p.category_id, p.created_at, pt.title, pt.description, \
             NULL::json AS translations, img.images, fa.filters, rv.rating, rv.reviews \
             FROM products AS p \
             LEFT JOIN product_translations AS pt ON pt.product_id = p.id AND pt.lang = $1 "
        ));
        assert!(rendered.sql.contains("AND vt.lang = $1 WHERE pf.product_id = p.id) AS fa ON TRUE"));
        assert!(!rendered.sql.contains("WITH "));
        assert!(!rendered.sql.contains(" WHERE p."));
        assert!(
            rendered
                .sql
                .ends_with(" ORDER BY p.created_at DESC, p.id DESC LIMIT $2 OFFSET $3")
        );
        assert_eq!(
            rendered.params,
            vec![
                SqlParam::Text("en".into()),
                SqlParam::BigInt(36),
                SqlParam::BigInt(0),
            ]
        );
    }

    #[test]
    fn test_predicates_take_sequential_slots() {
        let request = ProductsRequest {
            category_id: Some(CategoryId::new(9)),
            search: Some("linen dress".into()),
            language: Language::Ua,
            page: 3,
            ..ProductsRequest::default()
        };
        let rendered = listing(&request);

        assert!(rendered.sql.contains(
            " WHERE p.category_id = $2 AND EXISTS (SELECT 1 FROM product_translations AS s \
             WHERE s.product_id = p.id AND s.lang = $1 \
             AND s.search_vector @@ plainto_tsquery($3::text::regconfig, $4))"
        ));
        assert!(rendered.sql.ends_with("LIMIT $5 OFFSET $6"));
        assert_eq!(
            rendered.params,
            vec![
                SqlParam::Text("ua".into()),
                SqlParam::Int(9),
                SqlParam::Text("ukrainian".into()),
                SqlParam::Text("linen dress".into()),
                SqlParam::BigInt(36),
                SqlParam::BigInt(72),
            ]
        );
    }

    #[test]
    fn test_page_zero_has_no_limit() {
        let request = ProductsRequest::default();
        let rendered = listing(&request);
        assert!(!rendered.sql.contains("LIMIT"));
        assert!(!rendered.sql.contains("OFFSET"));
        assert_eq!(rendered.params.len(), 1);
    }

    #[test]
    fn test_ids_override_category() {
        let request = ProductsRequest {
            category_id: Some(CategoryId::new(2)),
            ids: vec![ProductId::new(5), ProductId::new(6)],
            ..ProductsRequest::default()
        };
        let rendered = listing(&request);
        assert!(rendered.sql.contains(" WHERE p.id = ANY($2)"));
        assert!(!rendered.sql.contains("p.category_id ="));
        assert_eq!(rendered.params.get(1), Some(&SqlParam::IntArray(vec![5, 6])));
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let request = ProductsRequest {
            search: Some("   ".into()),
            ..request()
        };
        assert!(!listing(&request).sql.contains("plainto_tsquery"));
    }

    #[test]
    fn test_facets_switch_base_relation() {
        let request = ProductsRequest {
            facets: [("color", "red"), ("size", "m")].into_iter().collect(),
            category_id: Some(CategoryId::new(1)),
            ..request()
        };
        let rendered = listing(&request);

        assert!(rendered.sql.starts_with("WITH query_filters (filter, variants) AS (VALUES ($1::text, $2::text[]), ($3::text, $4::text[])), filtered_products AS ("));
        assert!(rendered.sql.contains(" FROM filtered_products AS p LEFT JOIN product_translations AS pt ON pt.product_id = p.id AND pt.lang = $5 "));
        assert!(rendered.sql.contains(" WHERE p.category_id = $6 "));
        assert!(rendered.sql.ends_with("LIMIT $7 OFFSET $8"));
    }

    #[test]
    fn test_count_shares_scope_with_listing() {
        let requests = [
            request(),
            ProductsRequest {
                category_id: Some(CategoryId::new(4)),
                search: Some("wool".into()),
                facets: [("color", "red"), ("color", "blue"), ("size", "l")]
                    .into_iter()
                    .collect(),
                sort: SortOrder::Rating,
                page: 2,
                ..ProductsRequest::default()
            },
            ProductsRequest {
                ids: vec![ProductId::new(1)],
                with_translations: true,
                ..ProductsRequest::default()
            },
        ];

        for request in &requests {
            let listing = builder().listing(request);
            let count = builder().count(request);
            assert_eq!(listing.predicates(), count.predicates());

            let rendered = count.render().unwrap();
            let from = if request.facets.is_empty() {
                " FROM products AS p"
            } else {
                " FROM filtered_products AS p"
            };
            assert!(rendered.sql.contains(from));
            assert!(!rendered.sql.contains("LIMIT"));
            assert!(!rendered.sql.contains("ORDER BY"));
        }
    }

    #[test]
    fn test_count_sql() {
        let request = ProductsRequest {
            category_id: Some(CategoryId::new(4)),
            search: Some("wool".into()),
            language: Language::Ua,
            ..request()
        };
        let rendered = count(&request);
        assert_eq!(
            rendered.sql,
            "SELECT COUNT(*) AS total FROM products AS p WHERE p.category_id = $1 \
             AND EXISTS (SELECT 1 FROM product_translations AS s WHERE s.product_id = p.id \
             AND s.lang = $2 AND s.search_vector @@ plainto_tsquery($3::text::regconfig, $4))"
        );
        assert_eq!(
            rendered.params,
            vec![
                SqlParam::Int(4),
                SqlParam::Text("ua".into()),
                SqlParam::Text("ukrainian".into()),
                SqlParam::Text("wool".into()),
            ]
        );
    }

    #[test]
    fn test_count_without_facets_or_predicates() {
        let rendered = count(&ProductsRequest::default());
        assert_eq!(rendered.sql, "SELECT COUNT(*) AS total FROM products AS p");
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn test_sort_modes() {
        let order_of = |sort| {
            let request = ProductsRequest {
                sort,
                ..ProductsRequest::default()
            };
            listing(&request).sql
        };
        assert!(order_of(SortOrder::Rating).ends_with("ORDER BY rv.rating DESC, rv.reviews DESC, p.id DESC"));
        assert!(order_of(SortOrder::Cheap).ends_with("ORDER BY p.price ASC, p.id ASC"));
        assert!(order_of(SortOrder::Expensive).ends_with("ORDER BY p.price DESC, p.id DESC"));
    }

    #[test]
    fn test_all_translations_shape() {
        let request = ProductsRequest {
            with_translations: true,
            ..request()
        };
        let rendered = listing(&request);
        assert!(rendered.sql.contains("NULL::text AS title, NULL::text AS description, tr.translations"));
        assert!(rendered.sql.contains("json_object_agg(t.lang"));
        assert!(!rendered.sql.contains("LEFT JOIN product_translations AS pt"));
        // The language is still needed for variant labels
        assert_eq!(rendered.params.first(), Some(&SqlParam::Text("en".into())));
    }

    #[test]
    fn test_listing_is_deterministic() {
        let request = ProductsRequest {
            facets: FacetFilters::from_iter([("b", "2"), ("a", "1"), ("a", "0")]),
            search: Some("x".into()),
            ..request()
        };
        assert_eq!(listing(&request), listing(&request));
    }

    #[test]
    fn test_pagination_uses_configured_page_size() {
        let builder = ProductQueryBuilder::new(CatalogSettings {
            products_per_page: 10,
            ..CatalogSettings::default()
        });
        let request = ProductsRequest {
            page: 2,
            ..ProductsRequest::default()
        };
        let p = builder.pagination(&request, 25);
        assert!(p.has_more);
        assert_eq!(p.total_pages, 3);

        let rendered = builder.listing(&request).render().unwrap();
        assert_eq!(
            &rendered.params[1..],
            &[SqlParam::BigInt(10), SqlParam::BigInt(10)]
        );
    }

    #[test]
    fn test_detail_by_slug() {
        let rendered = builder()
            .detail("linen-dress", Language::En, false)
            .render()
            .unwrap();
        assert!(rendered.sql.ends_with(" WHERE p.slug = $2"));
        assert_eq!(rendered.params.get(1), Some(&SqlParam::Text("linen-dress".into())));
    }

    #[test]
    fn test_popular_in_category_subtree() {
        let rendered = builder()
            .popular(Some(CategoryId::new(3)), Language::En)
            .render()
            .unwrap();
        assert!(rendered.sql.starts_with("WITH RECURSIVE popularity AS ("));
        assert!(rendered.sql.contains("subtree (id) AS (SELECT id FROM categories WHERE id = $1 UNION ALL"));
        assert!(rendered.sql.contains(" WHERE p.category_id IN (SELECT id FROM subtree)"));
        assert!(rendered.sql.ends_with("ORDER BY COALESCE(pop.sold, 0) DESC, p.id DESC LIMIT $3"));
        assert_eq!(rendered.params.last(), Some(&SqlParam::BigInt(STRIP_LIMIT)));
    }

    #[test]
    fn test_popular_everywhere() {
        let rendered = builder().popular(None, Language::En).render().unwrap();
        assert!(rendered.sql.starts_with("WITH popularity AS ("));
        assert!(!rendered.sql.contains("subtree"));
    }

    #[test]
    fn test_recent_by_region() {
        let rendered = builder()
            .recent(Some("UA"), Language::Ua)
            .render()
            .unwrap();
        assert!(rendered.sql.contains("AND o.region = $1 GROUP BY oc.product_id"));
        assert!(rendered.sql.contains("JOIN recent ON recent.product_id = p.id"));
        assert_eq!(
            rendered.params,
            vec![
                SqlParam::Text("UA".into()),
                SqlParam::BigInt(STRIP_LIMIT),
                SqlParam::Text("ua".into()),
            ]
        );
    }
}
