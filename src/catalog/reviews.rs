use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Reference to another document, e.g. `{ "_id": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocRef {
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAuthor {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub user: Option<ReviewAuthor>,
    #[serde(default)]
    pub variant: Option<DocRef>,
    #[serde(default)]
    pub size_variant: Option<DocRef>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewList {
    #[serde(default)]
    pub reviews: Vec<Review>,
}

/// Body of `POST /user/review/add`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub product_id: String,
    pub variant_id: String,
    pub size_variant_id: String,
    pub rating: u8,
    pub comment: String,
}

impl NewReview {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=5).contains(&self.rating) {
            return Err(ValidationError::MissingRating);
        }
        if self.comment.trim().is_empty() {
            return Err(ValidationError::EmptyComment);
        }
        Ok(())
    }
}

/// Reviews written for one exact variant and size.
pub fn reviews_for_variant<'a>(
    reviews: &'a [Review],
    variant_id: &str,
    size_variant_id: &str,
) -> Vec<&'a Review> {
    reviews
        .iter()
        .filter(|review| {
            review.variant.as_ref().is_some_and(|v| v.id == variant_id)
                && review
                    .size_variant
                    .as_ref()
                    .is_some_and(|s| s.id == size_variant_id)
        })
        .collect()
}

pub fn average_rating(reviews: &[&Review]) -> Option<f64> {
    if reviews.is_empty() {
        return None;
    }
    let total: u32 = reviews.iter().map(|review| u32::from(review.rating)).sum();
    Some(f64::from(total) / reviews.len() as f64)
}
