//! Product review types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vitrina_core::{ProductId, ReviewId, UserId};

/// Highest rating a review may give.
pub const MAX_RATING: i16 = 5;
/// Longest review body, in characters.
pub const MAX_REVIEW_LENGTH: usize = 10_000;

/// A review with its author's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub rating: i16,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// The author has a live order containing the product.
    pub is_verified: bool,
}

/// Body for creating or updating the caller's review.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewReview {
    pub rating: i16,
    #[serde(default)]
    pub content: String,
}

impl NewReview {
    /// # Errors
    ///
    /// Returns a message naming the first rule violated.
    pub fn validate(&self) -> Result<(), String> {
        if !(0..=MAX_RATING).contains(&self.rating) {
            return Err(format!("rating must be 0-{MAX_RATING}"));
        }
        if self.content.chars().count() > MAX_REVIEW_LENGTH {
            return Err(format!("review is longer than {MAX_REVIEW_LENGTH} characters"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        let review = |rating| NewReview {
            rating,
            content: String::new(),
        };
        assert!(review(0).validate().is_ok());
        assert!(review(5).validate().is_ok());
        assert!(review(6).validate().is_err());
        assert!(review(-1).validate().is_err());
    }

    #[test]
    fn test_length_counts_characters() {
        let review = NewReview {
            rating: 4,
            content: "ї".repeat(MAX_REVIEW_LENGTH),
        };
        assert!(review.validate().is_ok());

        let review = NewReview {
            rating: 4,
            content: "a".repeat(MAX_REVIEW_LENGTH + 1),
        };
        assert!(review.validate().is_err());
    }
}
