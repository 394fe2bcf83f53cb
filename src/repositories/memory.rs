use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{
    CouponRepository, FoodRepository, OrderRepository, PaymentRepository, ReviewRepository,
    SequenceStore,
};
use crate::errors::ServiceError;
use crate::models::{
    Coupon, Food, Order, OrderFilter, OrderStatus, Payment, RatingSnapshot, Review, ReviewFilter,
};
use crate::services::sequence::SequenceKind;

/// DashMap-backed document store. Secondary maps act as the unique indexes, claimed through
/// the entry API so that concurrent inserts cannot both win.
#[derive(Default)]
pub struct InMemoryStore {
    orders: DashMap<Uuid, Order>,
    order_numbers: DashMap<String, Uuid>,
    invoice_numbers: DashMap<String, Uuid>,
    payments: DashMap<Uuid, Payment>,
    coupons: DashMap<Uuid, Coupon>,
    coupon_codes: DashMap<String, Uuid>,
    reviews: DashMap<Uuid, Review>,
    review_orders: DashMap<Uuid, Uuid>,
    foods: DashMap<Uuid, Food>,
    counters: DashMap<String, i64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim_invoice_number(&self, number: &str, order_id: Uuid) -> Result<(), ServiceError> {
        match self.invoice_numbers.entry(number.to_string()) {
            Entry::Occupied(existing) if *existing.get() != order_id => {
                Err(ServiceError::SequenceCollision(number.to_string()))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(order_id);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<(), ServiceError> {
        match self.order_numbers.entry(order.order_number.clone()) {
            Entry::Occupied(_) => {
                return Err(ServiceError::SequenceCollision(order.order_number.clone()))
            }
            Entry::Vacant(slot) => {
                slot.insert(order.id);
            }
        }

        if let Some(invoice_number) = &order.invoice_number {
            if let Err(err) = self.claim_invoice_number(invoice_number, order.id) {
                self.order_numbers.remove(&order.order_number);
                return Err(err);
            }
        }

        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, ServiceError> {
        Ok(self.orders.get(&id).map(|o| o.clone()))
    }

    async fn find_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Order>, ServiceError> {
        let id = match self.order_numbers.get(order_number) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.find_order(id).await
    }

    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| filter.matches(o.value()))
            .map(|o| o.value().clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn save_order(&self, order: &Order) -> Result<Order, ServiceError> {
        let mut stored = self
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order.id)))?;

        if stored.version != order.version {
            return Err(ServiceError::ConcurrentModification(order.id));
        }
        if stored.order_number != order.order_number {
            return Err(ServiceError::InvalidOperation(
                "Order numbers are immutable".to_string(),
            ));
        }
        if stored.invoice_number != order.invoice_number {
            if let Some(number) = &order.invoice_number {
                self.claim_invoice_number(number, order.id)?;
            }
        }

        let mut next = order.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool, ServiceError> {
        match self.orders.remove(&id) {
            Some((_, order)) => {
                self.order_numbers.remove(&order.order_number);
                if let Some(invoice_number) = &order.invoice_number {
                    self.invoice_numbers.remove(invoice_number);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_stale_pending_orders(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, ServiceError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Pending && o.created_at <= created_before)
            .map(|o| o.value().clone())
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert_payment(&self, payment: &Payment) -> Result<(), ServiceError> {
        match self.payments.entry(payment.id) {
            Entry::Occupied(_) => Err(ServiceError::Conflict(format!(
                "Payment {} already exists",
                payment.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(payment.clone());
                Ok(())
            }
        }
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, ServiceError> {
        Ok(self.payments.get(&id).map(|p| p.clone()))
    }

    async fn find_payment_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Payment>, ServiceError> {
        Ok(self
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .max_by_key(|p| p.created_at)
            .map(|p| p.value().clone()))
    }

    async fn find_payments_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<Payment>, ServiceError> {
        let mut payments: Vec<Payment> = self
            .payments
            .iter()
            .filter(|p| p.customer_id == customer_id)
            .map(|p| p.value().clone())
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn save_payment(&self, payment: &Payment) -> Result<(), ServiceError> {
        let mut stored = self
            .payments
            .get_mut(&payment.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment.id)))?;
        *stored = payment.clone();
        Ok(())
    }

    async fn delete_payments_for_order(&self, order_id: Uuid) -> Result<u64, ServiceError> {
        let before = self.payments.len();
        self.payments.retain(|_, p| p.order_id != order_id);
        Ok((before - self.payments.len()) as u64)
    }
}

#[async_trait]
impl CouponRepository for InMemoryStore {
    async fn insert_coupon(&self, coupon: &Coupon) -> Result<(), ServiceError> {
        match self.coupon_codes.entry(coupon.code.clone()) {
            Entry::Occupied(_) => Err(ServiceError::Conflict(format!(
                "Coupon code {} already exists",
                coupon.code
            ))),
            Entry::Vacant(slot) => {
                slot.insert(coupon.id);
                self.coupons.insert(coupon.id, coupon.clone());
                Ok(())
            }
        }
    }

    async fn find_coupon(&self, id: Uuid) -> Result<Option<Coupon>, ServiceError> {
        Ok(self.coupons.get(&id).map(|c| c.clone()))
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, ServiceError> {
        let id = match self.coupon_codes.get(code) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.find_coupon(id).await
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>, ServiceError> {
        let mut coupons: Vec<Coupon> = self.coupons.iter().map(|c| c.value().clone()).collect();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(coupons)
    }

    async fn save_coupon(&self, coupon: &Coupon) -> Result<(), ServiceError> {
        let previous_code = self
            .coupons
            .get(&coupon.id)
            .map(|c| c.code.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", coupon.id)))?;

        if previous_code != coupon.code {
            match self.coupon_codes.entry(coupon.code.clone()) {
                Entry::Occupied(_) => {
                    return Err(ServiceError::Conflict(format!(
                        "Coupon code {} already exists",
                        coupon.code
                    )))
                }
                Entry::Vacant(slot) => {
                    slot.insert(coupon.id);
                }
            }
            self.coupon_codes.remove(&previous_code);
        }

        self.coupons.insert(coupon.id, coupon.clone());
        Ok(())
    }

    async fn delete_coupon(&self, id: Uuid) -> Result<bool, ServiceError> {
        match self.coupons.remove(&id) {
            Some((_, coupon)) => {
                self.coupon_codes.remove(&coupon.code);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn claim_coupon_usage(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, ServiceError> {
        let mut coupon = self
            .coupons
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", id)))?;
        if coupon.usage_exhausted() {
            return Ok(false);
        }
        coupon.used_count += 1;
        coupon.updated_at = at;
        Ok(true)
    }
}

#[async_trait]
impl ReviewRepository for InMemoryStore {
    async fn insert_review(&self, review: &Review) -> Result<(), ServiceError> {
        match self.review_orders.entry(review.order_id) {
            Entry::Occupied(_) => Err(ServiceError::Conflict(format!(
                "Order {} has already been reviewed",
                review.order_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(review.id);
                self.reviews.insert(review.id, review.clone());
                Ok(())
            }
        }
    }

    async fn find_review(&self, id: Uuid) -> Result<Option<Review>, ServiceError> {
        Ok(self.reviews.get(&id).map(|r| r.clone()))
    }

    async fn find_review_for_order(&self, order_id: Uuid) -> Result<Option<Review>, ServiceError> {
        let id = match self.review_orders.get(&order_id) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.find_review(id).await
    }

    async fn find_reviews(&self, filter: &ReviewFilter) -> Result<Vec<Review>, ServiceError> {
        let mut reviews: Vec<Review> = self
            .reviews
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn save_review(&self, review: &Review) -> Result<(), ServiceError> {
        let mut stored = self
            .reviews
            .get_mut(&review.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Review {} not found", review.id)))?;
        *stored = review.clone();
        Ok(())
    }

    async fn ratings_for_food(&self, food_id: Uuid) -> Result<Vec<u8>, ServiceError> {
        Ok(self
            .reviews
            .iter()
            .flat_map(|review| {
                review
                    .food_ratings
                    .iter()
                    .filter(|entry| entry.food_id == food_id)
                    .map(|entry| entry.rating)
                    .collect::<Vec<_>>()
            })
            .collect())
    }
}

#[async_trait]
impl FoodRepository for InMemoryStore {
    async fn insert_food(&self, food: &Food) -> Result<(), ServiceError> {
        self.foods.insert(food.id, food.clone());
        Ok(())
    }

    async fn find_food(&self, id: Uuid) -> Result<Option<Food>, ServiceError> {
        Ok(self.foods.get(&id).map(|f| f.clone()))
    }

    async fn save_food_rating(
        &self,
        id: Uuid,
        snapshot: RatingSnapshot,
        estimated: bool,
    ) -> Result<(), ServiceError> {
        let mut food = self
            .foods
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("Food {} not found", id)))?;
        food.avg_rating = snapshot.avg_rating;
        food.rating_count = snapshot.rating_count;
        food.rating_estimated = estimated;
        Ok(())
    }

    async fn foods_with_estimated_rating(&self) -> Result<Vec<Uuid>, ServiceError> {
        Ok(self
            .foods
            .iter()
            .filter(|f| f.rating_estimated)
            .map(|f| f.id)
            .collect())
    }
}

#[async_trait]
impl SequenceStore for InMemoryStore {
    async fn greatest_with_prefix(
        &self,
        kind: SequenceKind,
        prefix: &str,
    ) -> Result<Option<String>, ServiceError> {
        let index = match kind {
            SequenceKind::Order => &self.order_numbers,
            SequenceKind::Invoice => &self.invoice_numbers,
        };
        Ok(index
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .max())
    }

    async fn increment_counter(&self, prefix: &str) -> Result<Option<i64>, ServiceError> {
        Ok(self.counters.get_mut(prefix).map(|mut value| {
            *value += 1;
            *value
        }))
    }

    async fn create_counter(&self, prefix: &str, value: i64) -> Result<(), ServiceError> {
        match self.counters.entry(prefix.to_string()) {
            Entry::Occupied(_) => Err(ServiceError::SequenceCollision(prefix.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }
}
