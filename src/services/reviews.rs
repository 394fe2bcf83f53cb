use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::ratings::{average, RatingAggregator};
use crate::common::Clock;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    FoodRating, Order, OrderStatus, RatingSnapshot, Review, ReviewFilter, ReviewInput, ReviewSort,
    SortDirection,
};
use crate::repositories::{FoodRepository, OrderRepository, ReviewRepository};

const MAX_RESPONSE_LEN: usize = 300;
/// Size of the best and worst rated dish lists
const DISH_SHORTLIST: usize = 5;

/// A single food rating submitted outside the full review form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FoodRatingInput {
    pub food_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: u8,
    #[serde(default)]
    #[validate(length(max = 300))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodRatingOutcome {
    pub food_id: Uuid,
    pub avg_rating: Decimal,
    pub rating_count: u32,
    /// True when the aggregate is an incremental estimate awaiting reconciliation
    pub estimated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodRatingSummary {
    pub food_id: Uuid,
    pub name: String,
    pub avg_rating: Decimal,
    pub rating_count: u32,
    pub estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishRating {
    pub food_id: Uuid,
    pub name: String,
    pub avg_rating: Decimal,
    pub total_reviews: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishRatingReport {
    pub best_rated: Vec<DishRating>,
    pub worst_rated: Vec<DishRating>,
    /// Every rated dish, best first
    pub all_dishes: Vec<DishRating>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingBucket {
    pub rating: u8,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub total_reviews: usize,
    pub avg_overall_rating: Decimal,
    pub avg_delivery_rating: Decimal,
    /// One bucket per star, 1 through 5
    pub rating_distribution: Vec<RatingBucket>,
}

impl ReviewStats {
    pub fn from_reviews(reviews: &[Review]) -> Self {
        let overall: Vec<u8> = reviews.iter().map(|r| r.overall_rating).collect();
        let delivery: Vec<u8> = reviews.iter().map(|r| r.delivery_rating).collect();
        let rating_distribution = (1..=5)
            .map(|rating| RatingBucket {
                rating,
                count: overall.iter().filter(|r| **r == rating).count(),
            })
            .collect();
        Self {
            total_reviews: reviews.len(),
            avg_overall_rating: average(&overall).avg_rating,
            avg_delivery_rating: average(&delivery).avg_rating,
            rating_distribution,
        }
    }
}

/// Groups per-food ratings across `reviews`. Dishes missing from `names` keep a placeholder.
pub fn rank_dishes(reviews: &[Review], names: &HashMap<Uuid, String>) -> DishRatingReport {
    let mut grouped: HashMap<Uuid, Vec<u8>> = HashMap::new();
    for entry in reviews.iter().flat_map(|r| r.food_ratings.iter()) {
        grouped.entry(entry.food_id).or_default().push(entry.rating);
    }

    let mut all_dishes: Vec<DishRating> = grouped
        .into_iter()
        .map(|(food_id, ratings)| {
            let snapshot = average(&ratings);
            DishRating {
                food_id,
                name: names
                    .get(&food_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown dish".to_string()),
                avg_rating: snapshot.avg_rating,
                total_reviews: snapshot.rating_count,
            }
        })
        .collect();
    all_dishes.sort_by(|a, b| {
        b.avg_rating
            .cmp(&a.avg_rating)
            .then_with(|| b.total_reviews.cmp(&a.total_reviews))
            .then_with(|| a.name.cmp(&b.name))
    });

    let best_rated = all_dishes.iter().take(DISH_SHORTLIST).cloned().collect();
    let mut worst_rated: Vec<DishRating> = all_dishes.clone();
    worst_rated.sort_by(|a, b| {
        a.avg_rating
            .cmp(&b.avg_rating)
            .then_with(|| b.total_reviews.cmp(&a.total_reviews))
            .then_with(|| a.name.cmp(&b.name))
    });
    worst_rated.truncate(DISH_SHORTLIST);

    DishRatingReport {
        best_rated,
        worst_rated,
        all_dishes,
    }
}

#[derive(Clone)]
pub struct ReviewService {
    orders: Arc<dyn OrderRepository>,
    reviews: Arc<dyn ReviewRepository>,
    foods: Arc<dyn FoodRepository>,
    aggregator: RatingAggregator,
    clock: Arc<dyn Clock>,
    event_sender: Option<Arc<EventSender>>,
    side_effect_timeout: Duration,
}

impl ReviewService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        reviews: Arc<dyn ReviewRepository>,
        foods: Arc<dyn FoodRepository>,
        clock: Arc<dyn Clock>,
        event_sender: Option<Arc<EventSender>>,
        side_effect_timeout: Duration,
    ) -> Self {
        Self {
            aggregator: RatingAggregator::new(reviews.clone(), foods.clone()),
            orders,
            reviews,
            foods,
            clock,
            event_sender,
            side_effect_timeout,
        }
    }

    pub fn aggregator(&self) -> &RatingAggregator {
        &self.aggregator
    }

    /// Loads an order the customer may rate: theirs, and delivered.
    async fn rateable_order(&self, order_id: Uuid, customer_id: Uuid) -> Result<Order, ServiceError> {
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .filter(|o| o.customer_id == customer_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if order.status != OrderStatus::Delivered {
            return Err(ServiceError::InvalidOperation(
                "Only delivered orders can be reviewed".to_string(),
            ));
        }
        Ok(order)
    }

    fn check_foods(order: &Order, ratings: &[FoodRating]) -> Result<(), ServiceError> {
        let mut seen = HashSet::new();
        for entry in ratings {
            entry.validate()?;
            if !order.contains_food(entry.food_id) {
                return Err(ServiceError::ValidationError(format!(
                    "Food {} is not part of order {}",
                    entry.food_id, order.order_number
                )));
            }
            if !seen.insert(entry.food_id) {
                return Err(ServiceError::ValidationError(format!(
                    "Food {} is rated more than once",
                    entry.food_id
                )));
            }
        }
        Ok(())
    }

    /// Flips `has_review` with a version-checked save so only one submission wins.
    async fn mark_reviewed(&self, mut order: Order) -> Result<Order, ServiceError> {
        if order.has_review {
            return Err(ServiceError::Conflict("Order has already been reviewed".to_string()));
        }
        order.has_review = true;
        order.updated_at = self.clock.now();
        match self.orders.save_order(&order).await {
            Ok(saved) => Ok(saved),
            Err(ServiceError::ConcurrentModification(id)) => {
                let current = self.orders.find_order(id).await?;
                if current.map_or(false, |o| o.has_review) {
                    Err(ServiceError::Conflict("Order has already been reviewed".to_string()))
                } else {
                    Err(ServiceError::ConcurrentModification(id))
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn restore_review_flag(&self, order_id: Uuid) {
        let restored = async {
            if let Some(mut order) = self.orders.find_order(order_id).await? {
                order.has_review = false;
                order.updated_at = self.clock.now();
                self.orders.save_order(&order).await?;
            }
            Ok::<_, ServiceError>(())
        }
        .await;
        if let Err(e) = restored {
            warn!(order_id = %order_id, error = %e, "Failed to restore review flag");
        }
    }

    async fn recompute_all(&self, food_ids: impl IntoIterator<Item = Uuid>) {
        for food_id in food_ids {
            if let Err(e) = self.aggregator.recompute_for_food(food_id).await {
                warn!(food_id = %food_id, error = %e, "Rating recompute failed");
            }
        }
    }

    async fn publish(&self, order: &Order, food_ids: Vec<Uuid>) {
        if let Some(sender) = &self.event_sender {
            sender
                .publish(
                    Event::RatingSubmitted {
                        order_id: order.id,
                        customer_id: order.customer_id,
                        food_ids,
                    },
                    self.side_effect_timeout,
                )
                .await;
        }
    }

    #[instrument(skip(self, input))]
    pub async fn submit_review(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
        input: ReviewInput,
    ) -> Result<Review, ServiceError> {
        input.validate()?;
        let order = self.rateable_order(order_id, customer_id).await?;
        Self::check_foods(&order, &input.food_ratings)?;

        let order = self.mark_reviewed(order).await?;
        let review = Review {
            id: Uuid::new_v4(),
            order_id,
            customer_id,
            food_ratings: input.food_ratings,
            delivery_rating: input.delivery_rating,
            overall_rating: input.overall_rating,
            comment: input.comment.filter(|c| !c.trim().is_empty()),
            admin_response: None,
            responded_at: None,
            created_at: self.clock.now(),
        };
        if let Err(e) = self.reviews.insert_review(&review).await {
            self.restore_review_flag(order_id).await;
            return Err(e);
        }

        let food_ids: Vec<Uuid> = review.food_ratings.iter().map(|r| r.food_id).collect();
        self.recompute_all(food_ids.clone()).await;
        info!(order_number = %order.order_number, overall = review.overall_rating, "Review submitted");
        self.publish(&order, food_ids).await;
        Ok(review)
    }

    /// Rates one food of a delivered order. Folds into the order's review when there is one,
    /// otherwise updates the aggregate incrementally.
    #[instrument(skip(self, input), fields(food_id = %input.food_id))]
    pub async fn submit_food_rating(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
        input: FoodRatingInput,
    ) -> Result<FoodRatingOutcome, ServiceError> {
        input.validate()?;
        let order = self.rateable_order(order_id, customer_id).await?;
        let entry = FoodRating {
            food_id: input.food_id,
            rating: input.rating,
            comment: input.comment.filter(|c| !c.trim().is_empty()),
        };
        Self::check_foods(&order, std::slice::from_ref(&entry))?;

        let (snapshot, estimated): (RatingSnapshot, bool) =
            match self.reviews.find_review_for_order(order_id).await? {
                Some(mut review) => {
                    match review.food_ratings.iter_mut().find(|r| r.food_id == entry.food_id) {
                        Some(existing) => *existing = entry.clone(),
                        None => review.food_ratings.push(entry.clone()),
                    }
                    self.reviews.save_review(&review).await?;
                    (self.aggregator.recompute_for_food(entry.food_id).await?, false)
                }
                None => (
                    self.aggregator.apply_incremental(entry.food_id, entry.rating).await?,
                    true,
                ),
            };

        self.publish(&order, vec![entry.food_id]).await;
        Ok(FoodRatingOutcome {
            food_id: entry.food_id,
            avg_rating: snapshot.avg_rating,
            rating_count: snapshot.rating_count,
            estimated,
        })
    }

    #[instrument(skip(self, response))]
    pub async fn respond(&self, review_id: Uuid, response: &str) -> Result<Review, ServiceError> {
        let response = response.trim();
        if response.is_empty() {
            return Err(ServiceError::ValidationError("Response is required".to_string()));
        }
        if response.chars().count() > MAX_RESPONSE_LEN {
            return Err(ServiceError::ValidationError(format!(
                "Response must be at most {} characters",
                MAX_RESPONSE_LEN
            )));
        }
        let mut review = self
            .reviews
            .find_review(review_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Review {} not found", review_id)))?;
        review.admin_response = Some(response.to_string());
        review.responded_at = Some(self.clock.now());
        self.reviews.save_review(&review).await?;
        Ok(review)
    }

    pub async fn get_for_order(&self, order_id: Uuid) -> Result<Review, ServiceError> {
        self.reviews
            .find_review_for_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("No review for order {}", order_id)))
    }

    /// Admin listing of reviews matching `filter`, in the requested order.
    pub async fn list_reviews(
        &self,
        filter: &ReviewFilter,
        sort: ReviewSort,
        direction: SortDirection,
    ) -> Result<Vec<Review>, ServiceError> {
        if let Some(rating) = filter.rating {
            if !(1..=5).contains(&rating) {
                return Err(ServiceError::ValidationError(
                    "Rating filter must be between 1 and 5".to_string(),
                ));
            }
        }
        let mut reviews = self.reviews.find_reviews(filter).await?;
        sort.apply(direction, &mut reviews);
        Ok(reviews)
    }

    /// Best and worst rated dishes from the per-food ratings of every review.
    pub async fn dish_ratings(&self) -> Result<DishRatingReport, ServiceError> {
        let reviews = self.reviews.find_reviews(&ReviewFilter::default()).await?;
        let food_ids: HashSet<Uuid> = reviews
            .iter()
            .flat_map(|r| r.food_ratings.iter().map(|entry| entry.food_id))
            .collect();

        let mut names = HashMap::with_capacity(food_ids.len());
        for food_id in food_ids {
            if let Some(food) = self.foods.find_food(food_id).await? {
                names.insert(food_id, food.name);
            }
        }
        Ok(rank_dishes(&reviews, &names))
    }

    pub async fn review_stats(&self) -> Result<ReviewStats, ServiceError> {
        let reviews = self.reviews.find_reviews(&ReviewFilter::default()).await?;
        Ok(ReviewStats::from_reviews(&reviews))
    }

    pub async fn food_rating_summary(&self, food_id: Uuid) -> Result<FoodRatingSummary, ServiceError> {
        let food = self
            .foods
            .find_food(food_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Food {} not found", food_id)))?;
        Ok(FoodRatingSummary {
            food_id: food.id,
            name: food.name,
            avg_rating: food.avg_rating,
            rating_count: food.rating_count,
            estimated: food.rating_estimated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FixedClock;
    use crate::models::fixtures::{at, order};
    use crate::models::Food;
    use crate::repositories::InMemoryStore;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    struct Harness {
        store: Arc<InMemoryStore>,
        service: ReviewService,
        order: Order,
        events: mpsc::Receiver<Event>,
    }

    async fn harness(status: OrderStatus) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let mut o = order("ORD-2025-000001", at(2025, 3, 1, 6, 0));
        o.status = status;
        store.insert_order(&o).await.unwrap();
        for item in &o.items {
            store
                .insert_food(&Food {
                    id: item.food_id,
                    name: item.name.clone(),
                    price: item.unit_price,
                    avg_rating: dec!(0),
                    rating_count: 0,
                    rating_estimated: false,
                })
                .await
                .unwrap();
        }
        let (tx, rx) = mpsc::channel(16);
        let service = ReviewService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(FixedClock::new(at(2025, 3, 2, 6, 0))),
            Some(Arc::new(EventSender::new(tx))),
            Duration::from_millis(200),
        );
        Harness {
            store,
            service,
            order: o,
            events: rx,
        }
    }

    fn input(order: &Order, rating: u8) -> ReviewInput {
        ReviewInput {
            food_ratings: vec![FoodRating {
                food_id: order.items[0].food_id,
                rating,
                comment: Some("Great".into()),
            }],
            delivery_rating: 4,
            overall_rating: 5,
            comment: Some("Quick delivery".into()),
        }
    }

    #[tokio::test]
    async fn review_updates_ratings_and_flags_order() {
        let mut h = harness(OrderStatus::Delivered).await;
        let o = h.order.clone();
        let review = h.service.submit_review(o.id, o.customer_id, input(&o, 4)).await.unwrap();

        assert_eq!(review.overall_rating, 5);
        let stored = h.store.find_order(o.id).await.unwrap().unwrap();
        assert!(stored.has_review);
        let food = h.store.find_food(o.items[0].food_id).await.unwrap().unwrap();
        assert_eq!(food.avg_rating, dec!(4));
        assert_eq!(food.rating_count, 1);
        assert_eq!(h.events.recv().await.unwrap().name(), "rating-submitted");
    }

    #[tokio::test]
    async fn second_review_conflicts() {
        let h = harness(OrderStatus::Delivered).await;
        let o = h.order.clone();
        h.service.submit_review(o.id, o.customer_id, input(&o, 4)).await.unwrap();
        assert_matches!(
            h.service.submit_review(o.id, o.customer_id, input(&o, 2)).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn undelivered_orders_cannot_be_reviewed() {
        let h = harness(OrderStatus::OutForDelivery).await;
        let o = h.order.clone();
        assert_matches!(
            h.service.submit_review(o.id, o.customer_id, input(&o, 4)).await,
            Err(ServiceError::InvalidOperation(_))
        );
    }

    #[tokio::test]
    async fn other_customers_see_not_found() {
        let h = harness(OrderStatus::Delivered).await;
        let o = h.order.clone();
        assert_matches!(
            h.service.submit_review(o.id, Uuid::new_v4(), input(&o, 4)).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn ratings_are_checked() {
        let h = harness(OrderStatus::Delivered).await;
        let o = h.order.clone();
        assert_matches!(
            h.service.submit_review(o.id, o.customer_id, input(&o, 6)).await,
            Err(ServiceError::ValidationError(_))
        );
        let mut foreign = input(&o, 4);
        foreign.food_ratings[0].food_id = Uuid::new_v4();
        assert_matches!(
            h.service.submit_review(o.id, o.customer_id, foreign).await,
            Err(ServiceError::ValidationError(_))
        );
        assert!(!h.store.find_order(o.id).await.unwrap().unwrap().has_review);
    }

    #[tokio::test]
    async fn food_rating_without_review_is_an_estimate() {
        let h = harness(OrderStatus::Delivered).await;
        let o = h.order.clone();
        let outcome = h
            .service
            .submit_food_rating(
                o.id,
                o.customer_id,
                FoodRatingInput { food_id: o.items[1].food_id, rating: 3, comment: None },
            )
            .await
            .unwrap();
        assert!(outcome.estimated);
        assert_eq!(outcome.avg_rating, dec!(3));

        let summary = h.service.food_rating_summary(o.items[1].food_id).await.unwrap();
        assert!(summary.estimated);
        assert_eq!(summary.rating_count, 1);
    }

    #[tokio::test]
    async fn food_rating_with_review_recomputes() {
        let h = harness(OrderStatus::Delivered).await;
        let o = h.order.clone();
        h.service.submit_review(o.id, o.customer_id, input(&o, 4)).await.unwrap();

        let outcome = h
            .service
            .submit_food_rating(
                o.id,
                o.customer_id,
                FoodRatingInput { food_id: o.items[0].food_id, rating: 2, comment: None },
            )
            .await
            .unwrap();
        assert!(!outcome.estimated);
        assert_eq!(outcome.avg_rating, dec!(2));
        assert_eq!(outcome.rating_count, 1);

        let review = h.service.get_for_order(o.id).await.unwrap();
        assert_eq!(review.food_ratings.len(), 1);
        assert_eq!(review.food_ratings[0].rating, 2);
    }

    #[tokio::test]
    async fn admin_response_is_bounded() {
        let h = harness(OrderStatus::Delivered).await;
        let o = h.order.clone();
        let review = h.service.submit_review(o.id, o.customer_id, input(&o, 4)).await.unwrap();

        let answered = h.service.respond(review.id, "Thanks for ordering!").await.unwrap();
        assert_eq!(answered.admin_response.as_deref(), Some("Thanks for ordering!"));
        assert!(answered.responded_at.is_some());

        let too_long = "x".repeat(301);
        assert_matches!(
            h.service.respond(review.id, &too_long).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            h.service.respond(Uuid::new_v4(), "hi").await,
            Err(ServiceError::NotFound(_))
        );
    }

    fn review_at(day: u32, overall: u8, delivery: u8, foods: &[(Uuid, u8)]) -> Review {
        Review {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            food_ratings: foods
                .iter()
                .map(|(food_id, rating)| FoodRating {
                    food_id: *food_id,
                    rating: *rating,
                    comment: None,
                })
                .collect(),
            delivery_rating: delivery,
            overall_rating: overall,
            comment: None,
            admin_response: None,
            responded_at: None,
            created_at: at(2025, 3, day, 8, 0),
        }
    }

    #[test]
    fn dishes_are_ranked_by_average() {
        let (dosa, idli, vada) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let reviews = vec![
            review_at(1, 5, 5, &[(dosa, 5), (idli, 2)]),
            review_at(2, 4, 4, &[(dosa, 4), (vada, 3)]),
            review_at(3, 3, 2, &[(idli, 3)]),
        ];
        let names = HashMap::from([(dosa, "Dosa".to_string()), (idli, "Idli".to_string())]);

        let report = rank_dishes(&reviews, &names);
        let best: Vec<&str> = report.best_rated.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(best, vec!["Dosa", "Unknown dish", "Idli"]);
        assert_eq!(report.all_dishes[0].avg_rating, dec!(4.5));
        assert_eq!(report.all_dishes[0].total_reviews, 2);
        // 2.5 is below vada's 3.0
        assert_eq!(report.worst_rated[0].name, "Idli");
        assert_eq!(report.worst_rated[0].avg_rating, dec!(2.5));
    }

    #[test]
    fn shortlists_hold_five_dishes() {
        let reviews: Vec<Review> = (1..=7u8)
            .map(|n| review_at(1, 5, 5, &[(Uuid::new_v4(), n % 5 + 1)]))
            .collect();
        let report = rank_dishes(&reviews, &HashMap::new());
        assert_eq!(report.all_dishes.len(), 7);
        assert_eq!(report.best_rated.len(), 5);
        assert_eq!(report.worst_rated.len(), 5);
        assert_eq!(report.best_rated[0].avg_rating, dec!(5));
        assert_eq!(report.worst_rated[0].avg_rating, dec!(1));
    }

    #[test]
    fn stats_cover_every_star() {
        let reviews = vec![
            review_at(1, 5, 4, &[]),
            review_at(2, 5, 3, &[]),
            review_at(3, 2, 3, &[]),
        ];
        let stats = ReviewStats::from_reviews(&reviews);
        assert_eq!(stats.total_reviews, 3);
        assert_eq!(stats.avg_overall_rating, dec!(4));
        // 10 / 3
        assert_eq!(stats.avg_delivery_rating, dec!(3.3));
        let counts: Vec<usize> = stats.rating_distribution.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![0, 1, 0, 0, 2]);

        let empty = ReviewStats::from_reviews(&[]);
        assert_eq!(empty.avg_overall_rating, dec!(0));
        assert_eq!(empty.rating_distribution.len(), 5);
    }

    #[tokio::test]
    async fn admin_listing_filters_and_sorts() {
        let h = harness(OrderStatus::Delivered).await;
        let first = review_at(1, 3, 4, &[]);
        let second = review_at(2, 5, 4, &[]);
        let third = review_at(3, 3, 2, &[]);
        for review in [&first, &second, &third] {
            h.store.insert_review(review).await.unwrap();
        }

        let newest = h
            .service
            .list_reviews(&ReviewFilter::default(), ReviewSort::Date, SortDirection::Desc)
            .await
            .unwrap();
        let ids: Vec<Uuid> = newest.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let by_rating = h
            .service
            .list_reviews(&ReviewFilter::default(), ReviewSort::Rating, SortDirection::Asc)
            .await
            .unwrap();
        let ids: Vec<Uuid> = by_rating.iter().map(|r| r.id).collect();
        // Equal ratings stay newest first
        assert_eq!(ids, vec![third.id, first.id, second.id]);

        let threes = ReviewFilter {
            rating: Some(3),
            from: Some(at(2025, 3, 2, 0, 0)),
            to: None,
        };
        let found = h
            .service
            .list_reviews(&threes, ReviewSort::Date, SortDirection::Desc)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, third.id);

        let bad = ReviewFilter {
            rating: Some(6),
            ..Default::default()
        };
        assert_matches!(
            h.service.list_reviews(&bad, ReviewSort::Date, SortDirection::Desc).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn dish_ratings_use_catalog_names() {
        let h = harness(OrderStatus::Delivered).await;
        let o = h.order.clone();
        h.service.submit_review(o.id, o.customer_id, input(&o, 4)).await.unwrap();

        let report = h.service.dish_ratings().await.unwrap();
        assert_eq!(report.all_dishes.len(), 1);
        assert_eq!(report.all_dishes[0].name, o.items[0].name);
        assert_eq!(report.all_dishes[0].avg_rating, dec!(4));

        let stats = h.service.review_stats().await.unwrap();
        assert_eq!(stats.total_reviews, 1);
        assert_eq!(stats.avg_overall_rating, dec!(5));
    }
}
