//! Facet index types: filters and their variants.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use vitrina_core::{CategoryId, FilterId, FilterVariantId, Translations};

use super::validate_slug;

/// One value of a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterVariant {
    pub id: FilterVariantId,
    pub slug: String,
    /// Label in the request language; absent when every language is returned.
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translations: Option<Translations>,
}

/// A filter of a category with its variants in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub id: FilterId,
    pub category_id: CategoryId,
    pub slug: String,
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translations: Option<Translations>,
    pub variants: Vec<FilterVariant>,
}

/// Body for creating or updating a variant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewFilterVariant {
    pub slug: String,
    pub title: Translations,
}

impl NewFilterVariant {
    /// # Errors
    ///
    /// Returns a message naming the first rule violated.
    pub fn validate(&self) -> Result<(), String> {
        validate_slug(&self.slug)?;
        if self.title.has_blank() {
            return Err(format!("variant {} needs a title in every language", self.slug));
        }
        Ok(())
    }
}

/// Body for creating a filter, optionally with its first variants.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewFilter {
    pub slug: String,
    pub title: Translations,
    #[serde(default)]
    pub variants: Vec<NewFilterVariant>,
}

impl NewFilter {
    /// # Errors
    ///
    /// Returns a message naming the first rule violated.
    pub fn validate(&self) -> Result<(), String> {
        validate_slug(&self.slug)?;
        if self.title.has_blank() {
            return Err("title is required in every language".to_owned());
        }
        let mut seen = BTreeSet::new();
        for variant in &self.variants {
            variant.validate()?;
            if !seen.insert(variant.slug.as_str()) {
                return Err(format!("variant {} is listed twice", variant.slug));
            }
        }
        Ok(())
    }
}

/// Body for updating a filter's own fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateFilter {
    pub slug: String,
    pub title: Translations,
}

impl UpdateFilter {
    /// # Errors
    ///
    /// Returns a message naming the first rule violated.
    pub fn validate(&self) -> Result<(), String> {
        validate_slug(&self.slug)?;
        if self.title.has_blank() {
            return Err("title is required in every language".to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(en: &str) -> Translations {
        Translations {
            en: en.into(),
            ua: en.into(),
        }
    }

    #[test]
    fn test_duplicate_variant_slugs_rejected() {
        let filter = NewFilter {
            slug: "color".into(),
            title: titled("Color"),
            variants: vec![
                NewFilterVariant {
                    slug: "red".into(),
                    title: titled("Red"),
                },
                NewFilterVariant {
                    slug: "red".into(),
                    title: titled("Crimson"),
                },
            ],
        };
        assert_eq!(filter.validate(), Err("variant red is listed twice".to_owned()));
    }

    #[test]
    fn test_variant_title_required() {
        let variant = NewFilterVariant {
            slug: "blue".into(),
            title: Translations::default(),
        };
        assert!(variant.validate().is_err());
    }
}
