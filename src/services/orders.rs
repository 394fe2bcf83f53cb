use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::pricing::PriceBreakdown;
use super::sequence::{retry_on_collision, SequenceAllocator};
use super::ServiceSettings;
use crate::common::{local_year, Clock};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    DeliveryAddress, Order, OrderFilter, OrderItem, OrderStatus, PaymentMethod, StatusEntry,
};
use crate::repositories::{OrderRepository, PaymentRepository};

const MAX_NOTES_LEN: usize = 500;

/// Which status moves `advance` accepts from a non-terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Any forward move along the delivery path, or Cancelled
    #[default]
    ForwardOnly,
    /// Only the next step, or Cancelled
    Sequential,
    /// Any recognised status
    Permissive,
}

impl TransitionPolicy {
    pub fn check(self, from: OrderStatus, to: OrderStatus) -> Result<(), ServiceError> {
        if from.is_terminal() {
            return Err(ServiceError::InvalidStatus(format!(
                "Order is already {} and cannot move to {}",
                from, to
            )));
        }
        if self == TransitionPolicy::Permissive || to == OrderStatus::Cancelled {
            return Ok(());
        }

        let allowed = match (from.stage(), to.stage()) {
            (Some(current), Some(next)) => match self {
                TransitionPolicy::Sequential => next == current + 1,
                _ => next > current,
            },
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(ServiceError::InvalidStatus(format!(
                "Cannot move order from {} to {}",
                from, to
            )))
        }
    }
}

/// Applies a status change to the in-memory document. Callers persist it.
pub fn apply_transition(
    order: &mut Order,
    to: OrderStatus,
    actor: Option<String>,
    now: DateTime<Utc>,
) {
    order.status = to;
    order.status_history.push(StatusEntry {
        status: to,
        timestamp: now,
        updated_by: actor,
    });
    match to {
        OrderStatus::Delivered => {
            order.is_delivered = true;
            order.delivered_at = Some(now);
        }
        OrderStatus::Cancelled => order.cancelled_at = Some(now),
        _ => {}
    }
    order.updated_at = now;
}

/// Everything needed to persist a freshly priced order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub delivery_address: DeliveryAddress,
    pub items: Vec<OrderItem>,
    pub price: PriceBreakdown,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub order_notes: Option<String>,
}

impl NewOrder {
    fn check(&self) -> Result<(), ServiceError> {
        if self.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }
        for item in &self.items {
            item.validate()?;
            item.check_bounds()?;
        }
        self.delivery_address.validate()?;
        if self.customer_name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Customer name is required".to_string(),
            ));
        }
        if self
            .order_notes
            .as_ref()
            .map_or(false, |n| n.chars().count() > MAX_NOTES_LEN)
        {
            return Err(ServiceError::ValidationError(format!(
                "Order notes must be at most {} characters",
                MAX_NOTES_LEN
            )));
        }
        Ok(())
    }

    fn into_order(self, now: DateTime<Utc>, gst_percentage: Decimal) -> Order {
        Order {
            id: Uuid::new_v4(),
            order_number: String::new(),
            customer_id: self.customer_id,
            customer_name: self.customer_name.trim().to_string(),
            customer_phone: self.customer_phone,
            customer_email: self.customer_email,
            delivery_address: self.delivery_address.normalized(),
            items: self.items,
            subtotal: self.price.subtotal,
            delivery_fee: self.delivery_fee,
            discount: self.discount,
            coupon_code: self.coupon_code,
            gst_amount: Some(self.price.gst_amount),
            gst_percentage: if self.price.gst_percentage.is_zero() {
                gst_percentage
            } else {
                self.price.gst_percentage
            },
            total_amount: self.price.total_amount,
            status: OrderStatus::Pending,
            status_history: vec![StatusEntry {
                status: OrderStatus::Pending,
                timestamp: now,
                updated_by: None,
            }],
            payment_id: None,
            payment_method: self.payment_method,
            is_paid: false,
            paid_at: None,
            is_delivered: false,
            delivered_at: None,
            cancelled_at: None,
            is_archived: false,
            archived_at: None,
            invoice_number: None,
            has_review: false,
            order_notes: self.order_notes.filter(|n| !n.trim().is_empty()),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }
}

/// Order lifecycle: creation, status transitions, archiving and lookups.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    allocator: SequenceAllocator,
    clock: Arc<dyn Clock>,
    event_sender: Option<Arc<EventSender>>,
    settings: ServiceSettings,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        allocator: SequenceAllocator,
        clock: Arc<dyn Clock>,
        event_sender: Option<Arc<EventSender>>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            orders,
            payments,
            allocator,
            clock,
            event_sender,
            settings,
        }
    }

    async fn publish(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.publish(event, self.settings.side_effect_timeout).await;
        }
    }

    /// Numbers and persists a new Pending order.
    #[instrument(skip(self, draft), fields(customer_id = %draft.customer_id))]
    pub async fn create(&self, draft: NewOrder) -> Result<Order, ServiceError> {
        draft.check()?;

        let now = self.clock.now();
        let year = local_year(now, self.settings.utc_offset);
        let template = draft.into_order(now, self.settings.gst_percentage);

        let order = retry_on_collision(self.settings.sequence_attempts, |_| {
            let mut candidate = template.clone();
            async move {
                candidate.order_number = self.allocator.next_order_number(year).await?;
                self.orders.insert_order(&candidate).await?;
                Ok(candidate)
            }
        })
        .await?;

        counter!("fresheats.orders.created", 1);
        info!(order_id = %order.id, order_number = %order.order_number, "Order created");

        self.publish(Event::OrderCreated {
            order_id: order.id,
            order_number: order.order_number.clone(),
            customer_id: order.customer_id,
            total_amount: order.total_amount,
        })
        .await;

        Ok(order)
    }

    /// Moves the order to `new_status` under the configured transition policy.
    #[instrument(skip(self, actor), fields(order_id = %order_id, to = %new_status))]
    pub async fn advance(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        actor: Option<String>,
    ) -> Result<Order, ServiceError> {
        let mut order = self.get(order_id).await?;
        let from = order.status;
        self.settings.transition_policy.check(from, new_status)?;

        apply_transition(&mut order, new_status, actor.clone(), self.clock.now());
        let saved = self.orders.save_order(&order).await.map_err(|e| {
            if matches!(e, ServiceError::ConcurrentModification(_)) {
                warn!(order_id = %order_id, "Order changed concurrently during status update");
            }
            e
        })?;

        info!(order_number = %saved.order_number, from = %from, to = %new_status, "Order status updated");
        self.publish(Event::OrderStatusChanged {
            order_id: saved.id,
            order_number: saved.order_number.clone(),
            customer_id: saved.customer_id,
            from,
            to: new_status,
            updated_by: actor,
        })
        .await;

        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn archive(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        let mut order = self.get(order_id).await?;
        if order.is_archived {
            return Ok(order);
        }
        let now = self.clock.now();
        order.is_archived = true;
        order.archived_at = Some(now);
        order.updated_at = now;
        let saved = self.orders.save_order(&order).await?;

        self.publish(Event::OrderArchived {
            order_id: saved.id,
            order_number: saved.order_number.clone(),
        })
        .await;
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn unarchive(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        let mut order = self.get(order_id).await?;
        if !order.is_archived {
            return Ok(order);
        }
        order.is_archived = false;
        order.archived_at = None;
        order.updated_at = self.clock.now();
        self.orders.save_order(&order).await
    }

    /// Irreversibly removes the order and its payment records.
    #[instrument(skip(self))]
    pub async fn hard_delete(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order = self.get(order_id).await?;
        let payments = self.payments.delete_payments_for_order(order.id).await?;
        self.orders.delete_order(order.id).await?;
        warn!(order_number = %order.order_number, payments, "Order permanently deleted");
        Ok(())
    }

    pub async fn get(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    pub async fn get_by_number(&self, order_number: &str) -> Result<Order, ServiceError> {
        self.orders
            .find_order_by_number(order_number.trim())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))
    }

    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError> {
        self.orders.find_orders(filter).await
    }

    /// A customer's order history, newest first.
    pub async fn history_for_customer(&self, customer_id: Uuid) -> Result<Vec<Order>, ServiceError> {
        self.orders
            .find_orders(&OrderFilter::for_customer(customer_id))
            .await
    }

    /// Removes a Pending order whose follow-up step failed right after creation.
    pub(crate) async fn discard_pending(&self, order: &Order) -> Result<(), ServiceError> {
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::InvalidOperation(format!(
                "Only pending orders can be discarded, {} is {}",
                order.order_number, order.status
            )));
        }
        self.orders.delete_order(order.id).await?;
        warn!(order_number = %order.order_number, "Pending order discarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FixedClock;
    use crate::models::fixtures;
    use crate::repositories::InMemoryStore;
    use crate::services::sequence::SequenceStrategy;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    use crate::models::OrderStatus::*;

    #[rstest]
    #[case(Pending, Confirmed, true)]
    #[case(Pending, Delivered, true)]
    #[case(Preparing, Confirmed, false)]
    #[case(Confirmed, Confirmed, false)]
    #[case(OutForDelivery, Cancelled, true)]
    fn forward_only_policy(#[case] from: OrderStatus, #[case] to: OrderStatus, #[case] ok: bool) {
        assert_eq!(TransitionPolicy::ForwardOnly.check(from, to).is_ok(), ok);
    }

    #[rstest]
    #[case(Pending, Confirmed, true)]
    #[case(Pending, Preparing, false)]
    #[case(Preparing, OutForDelivery, true)]
    #[case(Confirmed, Cancelled, true)]
    fn sequential_policy(#[case] from: OrderStatus, #[case] to: OrderStatus, #[case] ok: bool) {
        assert_eq!(TransitionPolicy::Sequential.check(from, to).is_ok(), ok);
    }

    #[rstest]
    #[case(TransitionPolicy::ForwardOnly)]
    #[case(TransitionPolicy::Sequential)]
    #[case(TransitionPolicy::Permissive)]
    fn terminal_states_reject_everything(#[case] policy: TransitionPolicy) {
        for to in [Pending, Confirmed, Delivered, Cancelled] {
            assert_matches!(policy.check(Delivered, to), Err(ServiceError::InvalidStatus(_)));
            assert_matches!(policy.check(Cancelled, to), Err(ServiceError::InvalidStatus(_)));
        }
        assert!(TransitionPolicy::Permissive.check(Preparing, Pending).is_ok());
    }

    struct Harness {
        service: OrderService,
        clock: FixedClock,
        events: mpsc::Receiver<Event>,
    }

    fn harness(policy: TransitionPolicy) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let clock = FixedClock::new(fixtures::at(2025, 3, 1, 6, 30));
        let (tx, rx) = mpsc::channel(32);
        let mut settings = ServiceSettings::default();
        settings.transition_policy = policy;
        let service = OrderService::new(
            store.clone(),
            store.clone(),
            SequenceAllocator::new(store, SequenceStrategy::Counter),
            Arc::new(clock.clone()),
            Some(Arc::new(EventSender::new(tx))),
            settings,
        );
        Harness {
            service,
            clock,
            events: rx,
        }
    }

    fn draft() -> NewOrder {
        NewOrder {
            customer_id: Uuid::new_v4(),
            customer_name: "Asha Rao".into(),
            customer_phone: "9876543210".into(),
            customer_email: None,
            delivery_address: fixtures::address(),
            items: vec![fixtures::item("Dosa", 2, dec!(90))],
            price: PriceBreakdown {
                subtotal: dec!(180),
                gst_amount: dec!(9),
                gst_percentage: dec!(5),
                total_amount: dec!(219),
            },
            delivery_fee: dec!(30),
            discount: dec!(0),
            coupon_code: None,
            payment_method: PaymentMethod::Upi,
            order_notes: Some("Less spicy".into()),
        }
    }

    #[tokio::test]
    async fn create_numbers_and_records_history() {
        let mut h = harness(TransitionPolicy::ForwardOnly);
        let first = h.service.create(draft()).await.unwrap();
        let second = h.service.create(draft()).await.unwrap();

        assert_eq!(first.order_number, "ORD-2025-000001");
        assert_eq!(second.order_number, "ORD-2025-000002");
        assert_eq!(first.status, Pending);
        assert_eq!(first.status_history.len(), 1);
        assert_eq!(first.status_history[0].updated_by, None);
        assert_eq!(h.events.recv().await.unwrap().name(), "order-created");
    }

    #[tokio::test]
    async fn year_follows_the_local_calendar() {
        let h = harness(TransitionPolicy::ForwardOnly);
        // 20:00 UTC on Dec 31 is already Jan 1 in IST
        h.clock.set(fixtures::at(2024, 12, 31, 20, 0));
        let order = h.service.create(draft()).await.unwrap();
        assert_eq!(order.order_number, "ORD-2025-000001");
    }

    #[tokio::test]
    async fn create_rejects_bad_carts() {
        let h = harness(TransitionPolicy::ForwardOnly);
        let mut empty = draft();
        empty.items.clear();
        assert_matches!(h.service.create(empty).await, Err(ServiceError::ValidationError(_)));

        let mut zero = draft();
        zero.items[0].quantity = 0;
        assert_matches!(h.service.create(zero).await, Err(ServiceError::ValidationError(_)));

        let mut pricey = draft();
        pricey.items[0].unit_price = Decimal::MAX;
        assert_matches!(h.service.create(pricey).await, Err(ServiceError::ValidationError(_)));

        let mut no_city = draft();
        no_city.delivery_address.city = String::new();
        assert_matches!(h.service.create(no_city).await, Err(ServiceError::ValidationError(_)));
    }

    fn max_scan_service(attempts: u32) -> OrderService {
        let store = Arc::new(InMemoryStore::new());
        let clock = FixedClock::new(fixtures::at(2025, 3, 1, 6, 30));
        let mut settings = ServiceSettings::default();
        settings.sequence_strategy = SequenceStrategy::MaxScan;
        settings.sequence_attempts = attempts;
        OrderService::new(
            store.clone(),
            store.clone(),
            SequenceAllocator::new(store, SequenceStrategy::MaxScan),
            Arc::new(clock),
            None,
            settings,
        )
    }

    async fn create_concurrently(
        service: &OrderService,
        count: usize,
    ) -> Vec<Result<Order, ServiceError>> {
        let handles: Vec<_> = (0..count)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.create(draft()).await })
            })
            .collect();
        let mut results = Vec::with_capacity(count);
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_max_scan_creates_retry_into_consecutive_numbers() {
        const COUNT: usize = 24;
        // Each collision means another create landed, so COUNT attempts always suffice
        let service = max_scan_service(COUNT as u32);

        let mut numbers: Vec<String> = create_concurrently(&service, COUNT)
            .await
            .into_iter()
            .map(|result| result.unwrap().order_number)
            .collect();
        numbers.sort();

        let expected: Vec<String> = (1..=COUNT)
            .map(|n| format!("ORD-2025-{:06}", n))
            .collect();
        assert_eq!(numbers, expected);
        assert_eq!(service.list(&OrderFilter::default()).await.unwrap().len(), COUNT);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_max_scan_creates_without_retries_conflict_cleanly() {
        const COUNT: usize = 24;
        let service = max_scan_service(1);

        let results = create_concurrently(&service, COUNT).await;
        let mut numbers = Vec::new();
        for result in results {
            match result {
                Ok(order) => numbers.push(order.order_number),
                Err(err) => assert_matches!(err, ServiceError::Conflict(_)),
            }
        }
        assert!(!numbers.is_empty());

        let created = numbers.len();
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), created);
        assert_eq!(service.list(&OrderFilter::default()).await.unwrap().len(), created);
    }

    #[tokio::test]
    async fn delivery_sets_flags_and_locks_the_order() {
        let h = harness(TransitionPolicy::ForwardOnly);
        let order = h.service.create(draft()).await.unwrap();
        h.clock.advance(chrono::Duration::minutes(40));

        let delivered = h
            .service
            .advance(order.id, Delivered, Some("rider-7".into()))
            .await
            .unwrap();
        assert!(delivered.is_delivered);
        assert_eq!(delivered.delivered_at, Some(h.clock.now()));
        assert_eq!(delivered.status_history.len(), 2);
        assert_eq!(
            delivered.status_history[1].updated_by.as_deref(),
            Some("rider-7")
        );

        assert_matches!(
            h.service.advance(order.id, Cancelled, None).await,
            Err(ServiceError::InvalidStatus(_))
        );
        let reloaded = h.service.get(order.id).await.unwrap();
        assert_eq!(reloaded.status_history.len(), 2);
        assert_eq!(reloaded.cancelled_at, None);
    }

    #[tokio::test]
    async fn cancellation_records_timestamp() {
        let h = harness(TransitionPolicy::Sequential);
        let order = h.service.create(draft()).await.unwrap();
        let cancelled = h.service.advance(order.id, Cancelled, None).await.unwrap();
        assert!(cancelled.cancelled_at.is_some());
        assert!(!cancelled.is_delivered);
    }

    #[tokio::test]
    async fn archive_hides_from_default_listing() {
        let h = harness(TransitionPolicy::ForwardOnly);
        let order = h.service.create(draft()).await.unwrap();
        h.service.create(draft()).await.unwrap();

        let archived = h.service.archive(order.id).await.unwrap();
        assert!(archived.archived_at.is_some());
        assert_eq!(h.service.list(&OrderFilter::default()).await.unwrap().len(), 1);

        let all = OrderFilter {
            include_archived: true,
            ..Default::default()
        };
        assert_eq!(h.service.list(&all).await.unwrap().len(), 2);

        let restored = h.service.unarchive(order.id).await.unwrap();
        assert!(!restored.is_archived);
        assert_eq!(restored.archived_at, None);
    }

    #[tokio::test]
    async fn customer_history_is_newest_first_and_scoped() {
        let h = harness(TransitionPolicy::ForwardOnly);
        let customer = Uuid::new_v4();
        let mut mine = draft();
        mine.customer_id = customer;

        let older = h.service.create(mine.clone()).await.unwrap();
        h.service.create(draft()).await.unwrap();
        h.clock.advance(chrono::Duration::minutes(5));
        let newer = h.service.create(mine).await.unwrap();
        h.service.archive(older.id).await.unwrap();

        let history = h.service.history_for_customer(customer).await.unwrap();
        let ids: Vec<Uuid> = history.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        assert!(h
            .service
            .history_for_customer(Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn hard_delete_removes_the_order() {
        let h = harness(TransitionPolicy::ForwardOnly);
        let order = h.service.create(draft()).await.unwrap();
        h.service.hard_delete(order.id).await.unwrap();
        assert_matches!(h.service.get(order.id).await, Err(ServiceError::NotFound(_)));
        assert_matches!(
            h.service.get_by_number(&order.order_number).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn stale_writers_get_concurrent_modification() {
        let h = harness(TransitionPolicy::ForwardOnly);
        let order = h.service.create(draft()).await.unwrap();
        h.service.advance(order.id, Confirmed, None).await.unwrap();

        // A writer still holding the version-1 document loses
        let mut stale = order.clone();
        apply_transition(&mut stale, Cancelled, None, h.clock.now());
        assert_matches!(
            h.service.orders.save_order(&stale).await,
            Err(ServiceError::ConcurrentModification(_))
        );
    }
}
