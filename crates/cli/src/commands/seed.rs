//! Seed the catalog from a YAML document.
//!
//! Categories nest through `children`; products reference their category by
//! slug and their facet values as `filter-slug: [variant-slug, ...]`.
//! Everything goes through the storefront repositories, so seeded data obeys
//! the same rules as data entered through the API.
//!
//! ```yaml
//! categories:
//!   - slug: dresses
//!     title: { en: Dresses, ua: Сукні }
//!     filters:
//!       - slug: color
//!         title: { en: Color, ua: Колір }
//!         variants:
//!           - { slug: red, title: { en: Red, ua: Червоний } }
//! products:
//!   - slug: linen-dress
//!     category: dresses
//!     price: 129900
//!     title: { en: Linen dress, ua: Лляна сукня }
//!     description: { en: "", ua: "" }
//!     filters: { color: [red] }
//!     images:
//!       - { url: "https://cdn.example/linen.jpg", width: 800, height: 1200 }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use vitrina_core::{CategoryId, FilterVariantId, Language, Price, Translations};
use vitrina_storefront::config::CatalogSettings;
use vitrina_storefront::db::{self, categories::CategoryRepository, filters::FilterRepository};
use vitrina_storefront::db::products::ProductRepository;
use vitrina_storefront::models::{NewCategory, NewFilter, NewProduct, NewProductImage};

#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

#[derive(Debug, Deserialize)]
pub struct CategorySeed {
    pub slug: String,
    pub title: Translations,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub filters: Vec<NewFilter>,
    #[serde(default)]
    pub children: Vec<CategorySeed>,
}

#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub slug: String,
    pub category: String,
    pub price: Price,
    pub title: Translations,
    #[serde(default)]
    pub description: Translations,
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub images: Vec<ImageSeed>,
}

#[derive(Debug, Deserialize)]
pub struct ImageSeed {
    pub url: String,
    pub width: i32,
    pub height: i32,
}

/// Variant ids of one category, keyed by filter slug then variant slug.
type VariantIndex = HashMap<String, HashMap<String, FilterVariantId>>;

/// Load a catalog YAML file into the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a reference cannot
/// be resolved, or a repository call fails.
pub async fn catalog(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;
    validate(&seed)?;
    info!(
        categories = seed.categories.len(),
        products = seed.products.len(),
        "Parsed catalog"
    );

    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let categories = CategoryRepository::new(&pool);
    let filters = FilterRepository::new(&pool);

    let mut category_ids: HashMap<String, CategoryId> = HashMap::new();
    let mut variants: HashMap<CategoryId, VariantIndex> = HashMap::new();

    // Parents are created before their children.
    let mut pending: Vec<(Option<CategoryId>, &CategorySeed)> =
        seed.categories.iter().rev().map(|c| (None, c)).collect();
    while let Some((parent_id, category)) = pending.pop() {
        let id = categories
            .create(&NewCategory {
                slug: category.slug.clone(),
                parent_id,
                image_url: category.image_url.clone(),
                title: category.title.clone(),
            })
            .await?;
        for filter in &category.filters {
            filters.create_filter(id, filter).await?;
        }

        let index = filters
            .list_for_category(id, Language::En, false)
            .await?
            .into_iter()
            .map(|filter| {
                let by_slug = filter.variants.into_iter().map(|v| (v.slug, v.id)).collect();
                (filter.slug, by_slug)
            })
            .collect();
        variants.insert(id, index);
        category_ids.insert(category.slug.clone(), id);

        pending.extend(category.children.iter().rev().map(|child| (Some(id), child)));
    }
    info!(count = category_ids.len(), "Categories created");

    let products = ProductRepository::new(&pool, CatalogSettings::default());
    for product in &seed.products {
        let category_id = *category_ids
            .get(&product.category)
            .ok_or_else(|| format!("{}: unknown category {}", product.slug, product.category))?;
        let index = variants.get(&category_id).cloned().unwrap_or_default();
        let new = NewProduct {
            slug: product.slug.clone(),
            price: product.price,
            category_id,
            title: product.title.clone(),
            description: product.description.clone(),
            filters: resolve_variants(&product.slug, &product.filters, &index)?,
            images: product
                .images
                .iter()
                .map(|image| NewProductImage {
                    id: Uuid::new_v4(),
                    image_url: image.url.clone(),
                    width: image.width,
                    height: image.height,
                })
                .collect(),
        };
        new.validate()?;
        products.create(&new).await?;
    }
    info!(count = seed.products.len(), "Products created");

    info!("Seeding complete!");
    Ok(())
}

/// Check slugs and titles before anything is written.
fn validate(seed: &CatalogSeed) -> Result<(), String> {
    let mut stack: Vec<&CategorySeed> = seed.categories.iter().collect();
    while let Some(category) = stack.pop() {
        NewCategory {
            slug: category.slug.clone(),
            parent_id: None,
            image_url: category.image_url.clone(),
            title: category.title.clone(),
        }
        .validate()?;
        for filter in &category.filters {
            filter.validate()?;
        }
        stack.extend(&category.children);
    }
    Ok(())
}

fn resolve_variants(
    product: &str,
    wanted: &BTreeMap<String, Vec<String>>,
    index: &VariantIndex,
) -> Result<Vec<FilterVariantId>, String> {
    let mut ids = Vec::new();
    for (filter, slugs) in wanted {
        let variants = index
            .get(filter)
            .ok_or_else(|| format!("{product}: unknown filter {filter}"))?;
        for slug in slugs {
            let id = variants
                .get(slug)
                .ok_or_else(|| format!("{product}: unknown variant {filter}={slug}"))?;
            ids.push(*id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CATALOG: &str = r"
categories:
  - slug: dresses
    title: { en: Dresses, ua: Сукні }
    filters:
      - slug: color
        title: { en: Color, ua: Колір }
        variants:
          - { slug: red, title: { en: Red, ua: Червоний } }
    children:
      - slug: maxi
        title: { en: Maxi, ua: Максі }
products:
  - slug: linen-dress
    category: maxi
    price: 129900
    title: { en: Linen dress, ua: Лляна сукня }
    filters: { color: [red] }
    images:
      - { url: 'https://cdn.example/linen.jpg', width: 800, height: 1200 }
";

    #[test]
    fn test_parse_catalog() {
        let seed: CatalogSeed = serde_yaml::from_str(CATALOG).unwrap();
        assert_eq!(seed.categories.len(), 1);
        assert_eq!(seed.categories[0].children[0].slug, "maxi");
        assert_eq!(seed.categories[0].filters[0].variants.len(), 1);
        assert_eq!(seed.products[0].price.minor_units(), 129_900);
        assert_eq!(seed.products[0].filters["color"], vec!["red".to_owned()]);
        assert!(validate(&seed).is_ok());
    }

    #[test]
    fn test_invalid_slug_is_rejected_before_writing() {
        let yaml = "categories:\n  - slug: Bad Slug\n    title: { en: X, ua: X }\n";
        let seed: CatalogSeed = serde_yaml::from_str(yaml).unwrap();
        assert!(validate(&seed).is_err());
    }

    #[test]
    fn test_resolve_variants() {
        let mut index = VariantIndex::new();
        index.insert(
            "color".to_owned(),
            HashMap::from([("red".to_owned(), FilterVariantId::new(7))]),
        );

        let wanted = BTreeMap::from([("color".to_owned(), vec!["red".to_owned()])]);
        assert_eq!(
            resolve_variants("dress", &wanted, &index).unwrap(),
            vec![FilterVariantId::new(7)]
        );

        let unknown = BTreeMap::from([("size".to_owned(), vec!["m".to_owned()])]);
        assert!(resolve_variants("dress", &unknown, &index).is_err());
    }
}
