//! Domain models for the storefront API.
//!
//! Request bodies derive `Deserialize`, responses derive `Serialize` with
//! camelCase field names.

pub mod category;
pub mod filter;
pub mod order;
pub mod product;
pub mod review;
pub mod user;

use serde::Serialize;

pub use category::{Category, CategoryNode, CategoryView, NewCategory};
pub use filter::{Filter, FilterVariant, NewFilter, NewFilterVariant, UpdateFilter};
pub use order::{NewOrder, Order, OrderLine, PlacedOrder};
pub use product::{
    Crumb, FacetFilters, NewProduct, NewProductImage, Product, ProductDetail, ProductRoute, ProductsPage,
    ProductsRequest, SortOrder,
};
pub use review::{NewReview, Review};
pub use user::{
    Credentials, LoginId, LoginRequest, NewUser, PasswordChange, RestoreComplete, RestoreRequest,
    RestoreVerify, User, UserPatch,
};

/// Longest accepted slug.
pub const MAX_SLUG_LENGTH: usize = 128;

/// Position of one page within a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub has_more: bool,
    pub total_pages: i64,
}

impl Pagination {
    /// Summarize `total` rows split into pages of `page_size`.
    ///
    /// `page` is 1-based; page 0 means the caller fetched everything, so
    /// there is never more to load.
    #[must_use]
    pub fn new(total: i64, page: u32, page_size: u32) -> Self {
        let total = total.max(0);
        let page_size = i64::from(page_size.max(1));
        let has_more = page > 0 && total > i64::from(page) * page_size;
        Self {
            total,
            has_more,
            total_pages: (total + page_size - 1) / page_size,
        }
    }
}

/// Slugs are lowercase ASCII words joined by single hyphens.
///
/// # Errors
///
/// Returns a message describing why the slug is rejected.
pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() || slug.len() > MAX_SLUG_LENGTH {
        return Err(format!("slug must be 1-{MAX_SLUG_LENGTH} characters"));
    }
    let valid_chars = slug
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !valid_chars || slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err(format!("invalid slug: {slug}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_page_boundary() {
        let p = Pagination::new(36, 1, 36);
        assert!(!p.has_more);
        assert_eq!(p.total_pages, 1);
    }

    #[test]
    fn test_one_past_boundary() {
        let first = Pagination::new(37, 1, 36);
        assert!(first.has_more);
        assert_eq!(first.total_pages, 2);

        let second = Pagination::new(37, 2, 36);
        assert!(!second.has_more);
    }

    #[test]
    fn test_unpaginated_never_has_more() {
        let p = Pagination::new(500, 0, 36);
        assert!(!p.has_more);
        assert_eq!(p.total_pages, 14);
    }

    #[test]
    fn test_empty_result() {
        let p = Pagination::new(0, 1, 36);
        assert!(!p.has_more);
        assert_eq!(p.total_pages, 0);
    }

    #[test]
    fn test_pages_cover_total() {
        for total in [1_i64, 35, 36, 37, 71, 72, 73] {
            let p = Pagination::new(total, 1, 36);
            let covered: i64 = (1..=p.total_pages)
                .map(|page| (total - (page - 1) * 36).min(36))
                .sum();
            assert_eq!(covered, total);
        }
    }

    #[test]
    fn test_slug_rules() {
        assert!(validate_slug("summer-dress-2").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("Dress").is_err());
        assert!(validate_slug("-dress").is_err());
        assert!(validate_slug("a--b").is_err());
        assert!(validate_slug("сукня").is_err());
    }

    #[test]
    fn test_pagination_serializes_camel_case() {
        let json = serde_json::to_value(Pagination::new(37, 1, 36)).unwrap_or_default();
        assert_eq!(json["hasMore"], true);
        assert_eq!(json["totalPages"], 2);
    }
}
