use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::RatingSnapshot;
use crate::repositories::{FoodRepository, ReviewRepository};

fn one_decimal(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Mean of `ratings` at one decimal place, with the count.
pub fn average(ratings: &[u8]) -> RatingSnapshot {
    if ratings.is_empty() {
        return RatingSnapshot::EMPTY;
    }
    let sum: u32 = ratings.iter().map(|r| u32::from(*r)).sum();
    RatingSnapshot {
        avg_rating: one_decimal(Decimal::from(sum) / Decimal::from(ratings.len() as u32)),
        rating_count: ratings.len() as u32,
    }
}

/// Folds one more rating into a running average. Drifts from the exact mean because the
/// stored average is already rounded.
pub fn incremental_update(avg: Decimal, count: u32, rating: u8) -> RatingSnapshot {
    let next = count + 1;
    RatingSnapshot {
        avg_rating: one_decimal((avg * Decimal::from(count) + Decimal::from(rating)) / Decimal::from(next)),
        rating_count: next,
    }
}

/// Keeps the catalog's per-food aggregate in line with review line items.
#[derive(Clone)]
pub struct RatingAggregator {
    reviews: Arc<dyn ReviewRepository>,
    foods: Arc<dyn FoodRepository>,
}

impl RatingAggregator {
    pub fn new(reviews: Arc<dyn ReviewRepository>, foods: Arc<dyn FoodRepository>) -> Self {
        Self { reviews, foods }
    }

    /// Recomputes the aggregate from every review and stores it as exact.
    #[instrument(skip(self))]
    pub async fn recompute_for_food(&self, food_id: Uuid) -> Result<RatingSnapshot, ServiceError> {
        let ratings = self.reviews.ratings_for_food(food_id).await?;
        let snapshot = average(&ratings);
        self.foods.save_food_rating(food_id, snapshot, false).await?;
        debug!(avg = %snapshot.avg_rating, count = snapshot.rating_count, "Food rating recomputed");
        Ok(snapshot)
    }

    /// Quick path for a rating that has no review to live in. Stored as an estimate.
    #[instrument(skip(self))]
    pub async fn apply_incremental(&self, food_id: Uuid, rating: u8) -> Result<RatingSnapshot, ServiceError> {
        let food = self
            .foods
            .find_food(food_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Food {} not found", food_id)))?;
        let snapshot = incremental_update(food.avg_rating, food.rating_count, rating);
        self.foods.save_food_rating(food_id, snapshot, true).await?;
        Ok(snapshot)
    }

    /// Recomputes every food whose aggregate is still an estimate. Returns how many were fixed.
    #[instrument(skip(self))]
    pub async fn reconcile_estimated(&self) -> Result<usize, ServiceError> {
        let flagged = self.foods.foods_with_estimated_rating().await?;
        let mut fixed = 0;
        for food_id in flagged {
            match self.recompute_for_food(food_id).await {
                Ok(_) => {
                    fixed += 1;
                    metrics::counter!("fresheats.reconciliation.repairs", 1, "kind" => "rating");
                }
                Err(e) => warn!(food_id = %food_id, error = %e, "Rating reconciliation failed"),
            }
        }
        if fixed > 0 {
            info!(fixed, "Reconciled estimated food ratings");
        }
        Ok(fixed)
    }
}
