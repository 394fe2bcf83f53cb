//! Persistence seams. Services only ever see these traits; the binary wires the SQL store and
//! tests wire the in-memory one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{
    Coupon, Food, Order, OrderFilter, Payment, RatingSnapshot, Review, ReviewFilter,
};
use crate::services::sequence::SequenceKind;

pub mod memory;
pub mod sql;

pub use memory::InMemoryStore;
pub use sql::SqlStore;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts a new order. A duplicate order or invoice number yields `SequenceCollision`.
    async fn insert_order(&self, order: &Order) -> Result<(), ServiceError>;

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, ServiceError>;

    async fn find_order_by_number(&self, order_number: &str)
        -> Result<Option<Order>, ServiceError>;

    /// Orders matching `filter`, newest first.
    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError>;

    /// Replaces the stored document if its version still equals `order.version`.
    /// Returns the stored copy with the bumped version.
    async fn save_order(&self, order: &Order) -> Result<Order, ServiceError>;

    async fn delete_order(&self, id: Uuid) -> Result<bool, ServiceError>;

    /// Orders still Pending that were created at or before `created_before`, oldest first.
    async fn find_stale_pending_orders(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, ServiceError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert_payment(&self, payment: &Payment) -> Result<(), ServiceError>;

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, ServiceError>;

    async fn find_payment_for_order(&self, order_id: Uuid)
        -> Result<Option<Payment>, ServiceError>;

    /// Every payment a customer has made, newest first.
    async fn find_payments_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<Payment>, ServiceError>;

    async fn save_payment(&self, payment: &Payment) -> Result<(), ServiceError>;

    async fn delete_payments_for_order(&self, order_id: Uuid) -> Result<u64, ServiceError>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Duplicate codes yield `Conflict`.
    async fn insert_coupon(&self, coupon: &Coupon) -> Result<(), ServiceError>;

    async fn find_coupon(&self, id: Uuid) -> Result<Option<Coupon>, ServiceError>;

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, ServiceError>;

    async fn list_coupons(&self) -> Result<Vec<Coupon>, ServiceError>;

    async fn save_coupon(&self, coupon: &Coupon) -> Result<(), ServiceError>;

    async fn delete_coupon(&self, id: Uuid) -> Result<bool, ServiceError>;

    /// Increments `used_count` only while it is below `usage_limit`, as one storage operation.
    /// Returns false when the cap was already reached.
    async fn claim_coupon_usage(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// A second review for the same order yields `Conflict`.
    async fn insert_review(&self, review: &Review) -> Result<(), ServiceError>;

    async fn find_review(&self, id: Uuid) -> Result<Option<Review>, ServiceError>;

    async fn find_review_for_order(&self, order_id: Uuid) -> Result<Option<Review>, ServiceError>;

    /// Reviews matching `filter`, newest first.
    async fn find_reviews(&self, filter: &ReviewFilter) -> Result<Vec<Review>, ServiceError>;

    async fn save_review(&self, review: &Review) -> Result<(), ServiceError>;

    /// Every per-food rating for `food_id` across all reviews.
    async fn ratings_for_food(&self, food_id: Uuid) -> Result<Vec<u8>, ServiceError>;
}

#[async_trait]
pub trait FoodRepository: Send + Sync {
    async fn insert_food(&self, food: &Food) -> Result<(), ServiceError>;

    async fn find_food(&self, id: Uuid) -> Result<Option<Food>, ServiceError>;

    async fn save_food_rating(
        &self,
        id: Uuid,
        snapshot: RatingSnapshot,
        estimated: bool,
    ) -> Result<(), ServiceError>;

    async fn foods_with_estimated_rating(&self) -> Result<Vec<Uuid>, ServiceError>;
}

#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Lexicographically greatest identifier of `kind` starting with `prefix`.
    async fn greatest_with_prefix(
        &self,
        kind: SequenceKind,
        prefix: &str,
    ) -> Result<Option<String>, ServiceError>;

    /// Atomically bumps the counter for `prefix`; `None` when it has not been created yet.
    async fn increment_counter(&self, prefix: &str) -> Result<Option<i64>, ServiceError>;

    /// Creates the counter at `value`. A concurrent creator yields `SequenceCollision`.
    async fn create_counter(&self, prefix: &str, value: i64) -> Result<(), ServiceError>;
}

/// The full set of repositories a service graph needs
#[derive(Clone)]
pub struct Repositories {
    pub orders: Arc<dyn OrderRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub coupons: Arc<dyn CouponRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub foods: Arc<dyn FoodRepository>,
    pub sequences: Arc<dyn SequenceStore>,
}

impl Repositories {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: OrderRepository
            + PaymentRepository
            + CouponRepository
            + ReviewRepository
            + FoodRepository
            + SequenceStore
            + 'static,
    {
        Self {
            orders: store.clone(),
            payments: store.clone(),
            coupons: store.clone(),
            reviews: store.clone(),
            foods: store.clone(),
            sequences: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryStore::new()))
    }

    pub fn sql(db: Arc<DatabaseConnection>) -> Self {
        Self::from_store(Arc::new(SqlStore::new(db)))
    }
}
