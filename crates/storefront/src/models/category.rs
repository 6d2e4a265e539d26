//! Category tree types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use vitrina_core::{CategoryId, Translations};

use super::validate_slug;

/// A category with its title resolved in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub slug: String,
    pub parent_id: Option<CategoryId>,
    pub image_url: Option<String>,
    pub title: Option<String>,
}

/// A category with its descendants, for navigation menus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    /// Assemble a forest from a flat list, keeping the input order among
    /// siblings.
    ///
    /// Nodes unreachable from a root (a dangling parent or a cycle) are
    /// dropped.
    #[must_use]
    pub fn build_tree(categories: Vec<Category>) -> Vec<Self> {
        let mut children: HashMap<Option<CategoryId>, Vec<Category>> = HashMap::new();
        for category in categories {
            children.entry(category.parent_id).or_default().push(category);
        }
        attach(&mut children, None)
    }
}

fn attach(
    children: &mut HashMap<Option<CategoryId>, Vec<Category>>,
    parent: Option<CategoryId>,
) -> Vec<CategoryNode> {
    let Some(level) = children.remove(&parent) else {
        return Vec::new();
    };
    level
        .into_iter()
        .map(|category| {
            let nested = attach(children, Some(category.id));
            CategoryNode {
                category,
                children: nested,
            }
        })
        .collect()
}

/// Admin view of a category with every title translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryView {
    pub id: CategoryId,
    pub slug: String,
    pub parent_id: Option<CategoryId>,
    pub image_url: Option<String>,
    pub title: Translations,
}

/// Body for creating or updating a category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub slug: String,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub title: Translations,
}

impl NewCategory {
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
