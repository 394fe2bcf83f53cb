use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct FoodRating {
    pub food_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub rating: u8,
    #[serde(default)]
    #[validate(length(max = 300))]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub food_ratings: Vec<FoodRating>,
    pub delivery_rating: u8,
    pub overall_rating: u8,
    pub comment: Option<String>,
    pub admin_response: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Customer input for a delivered order's review
#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
pub struct ReviewInput {
    #[serde(default)]
    pub food_ratings: Vec<FoodRating>,
    #[validate(range(min = 1, max = 5, message = "Delivery rating must be between 1 and 5"))]
    pub delivery_rating: u8,
    #[validate(range(min = 1, max = 5, message = "Overall rating must be between 1 and 5"))]
    pub overall_rating: u8,
    #[serde(default)]
    #[validate(length(max = 500, message = "Comment must be at most 500 characters"))]
    pub comment: Option<String>,
}

/// Admin review listing filter. `from` is inclusive and `to` is exclusive.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReviewFilter {
    pub rating: Option<u8>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ReviewFilter {
    pub fn matches(&self, review: &Review) -> bool {
        if self.rating.is_some_and(|rating| rating != review.overall_rating) {
            return false;
        }
        if self.from.is_some_and(|from| review.created_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| review.created_at >= to) {
            return false;
        }
        true
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewSort {
    #[default]
    Date,
    Rating,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl ReviewSort {
    /// Orders `reviews` in place. Equal ratings fall back to newest first.
    pub fn apply(self, direction: SortDirection, reviews: &mut [Review]) {
        reviews.sort_by(|a, b| {
            let primary = match self {
                ReviewSort::Date => a.created_at.cmp(&b.created_at),
                ReviewSort::Rating => a.overall_rating.cmp(&b.overall_rating),
            };
            let primary = match direction {
                SortDirection::Asc => primary,
                SortDirection::Desc => primary.reverse(),
            };
            primary.then_with(|| b.created_at.cmp(&a.created_at))
        });
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Food {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    /// Derived from review line items; 0..=5 at one decimal
    pub avg_rating: Decimal,
    pub rating_count: u32,
    /// Set when the aggregate came from the incremental path and awaits a full recompute
    pub rating_estimated: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub avg_rating: Decimal,
    pub rating_count: u32,
}

impl RatingSnapshot {
    pub const EMPTY: RatingSnapshot = RatingSnapshot {
        avg_rating: Decimal::ZERO,
        rating_count: 0,
    };
}
