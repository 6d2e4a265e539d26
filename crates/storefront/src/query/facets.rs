//! The facet-restricted product relation.
//!
//! Requested facets become a `query_filters (filter, variants)` values list,
//! one row per filter slug. `filtered_products` joins every product's
//! variant assignments against it and keeps the products that matched every
//! row:
//!
//! ```sql
//! WITH query_filters (filter, variants) AS (VALUES ($1::text, $2::text[]), ...),
//! filtered_products AS (
//!     SELECT p.* FROM products AS p
//!     JOIN product_filters AS pf ON pf.product_id = p.id
//!     JOIN filter_variants AS fv ON fv.id = pf.variant_id
//!     JOIN filters AS f ON f.id = fv.filter_id
//!     JOIN query_filters AS qf ON qf.filter = f.slug AND fv.slug = ANY(qf.variants)
//!     GROUP BY p.id
//!     HAVING COUNT(DISTINCT qf.filter) = (SELECT COUNT(*) FROM query_filters))
//! ```
//!
//! Counting distinct matched filter slugs, not matched rows, means a product
//! holding two accepted variants of one filter still counts that filter once.
//! A slug no filter carries matches nothing, so the result is empty.

use super::sql::{Cte, Fragment, Select, SqlParam};
use crate::models::FacetFilters;

/// Name of the requested-facets values list.
pub const QUERY_FILTERS: &str = "query_filters";

/// Name of the restricted product relation.
pub const FILTERED_PRODUCTS: &str = "filtered_products";

/// Build the CTEs that define [`FILTERED_PRODUCTS`].
///
/// Returns `None` when no facets were requested; callers then read the
/// `products` table directly.
#[must_use]
pub fn restricting_ctes(facets: &FacetFilters) -> Option<[Cte; 2]> {
    if facets.is_empty() {
        return None;
    }

    let rows = facets.iter().map(|(filter, variants)| {
        Fragment::sql("(")
            .bind(SqlParam::Text(filter.to_owned()))
            .push("::text, ")
            .bind(SqlParam::TextArray(variants.iter().cloned().collect()))
            .push("::text[])")
    });
    let query_filters = Cte::fragment(
        QUERY_FILTERS,
        Fragment::sql("VALUES ").append(Fragment::join(rows, ", ")),
    )
    .columns("filter, variants");

    let mut matched = Select::from(Fragment::sql("products AS p"));
    matched.column(Fragment::sql("p.*"));
    matched.join(Fragment::sql(
        "JOIN product_filters AS pf ON pf.product_id = p.id",
    ));
    matched.join(Fragment::sql(
        "JOIN filter_variants AS fv ON fv.id = pf.variant_id",
    ));
    matched.join(Fragment::sql("JOIN filters AS f ON f.id = fv.filter_id"));
    matched.join(Fragment::sql(
        "JOIN query_filters AS qf ON qf.filter = f.slug AND fv.slug = ANY(qf.variants)",
    ));
    matched.group_by(Fragment::sql("p.id"));
    matched.having(Fragment::sql(
        "COUNT(DISTINCT qf.filter) = (SELECT COUNT(*) FROM query_filters)",
    ));

    Some([query_filters, Cte::select(FILTERED_PRODUCTS, matched)])
}
