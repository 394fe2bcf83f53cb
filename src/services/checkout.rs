use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::coupons::CouponService;
use super::delivery::{DeliveryFeeCalculator, DeliveryQuote};
use super::orders::{NewOrder, OrderService};
use super::payments::{PaymentService, SYSTEM_ACTOR};
use super::pricing::{self, PricingAssembler};
use crate::common::Clock;
use crate::errors::ServiceError;
use crate::models::{
    DeliveryAddress, Order, OrderItem, OrderStatus, Payment, PaymentMethod, PaymentMethodDetails,
    PaymentStatus,
};
use crate::notifications::NotificationDispatcher;

/// Cart submitted by the customer at checkout
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub customer_id: Uuid,
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    #[validate(length(min = 1, message = "Customer phone is required"))]
    pub customer_phone: String,
    #[serde(default)]
    #[validate(email)]
    pub customer_email: Option<String>,
    #[validate]
    pub delivery_address: DeliveryAddress,
    pub items: Vec<OrderItem>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_details: PaymentMethodDetails,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500, message = "Order notes must be at most 500 characters"))]
    pub order_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub id: Uuid,
    pub order_number: String,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub success: bool,
    pub message: String,
    pub order: PlacedOrder,
    pub delivery: DeliveryQuote,
    pub discount: Decimal,
}

/// Runs a cart through coupon, delivery, pricing, creation, payment and confirmation.
#[derive(Clone)]
pub struct CheckoutService {
    coupons: CouponService,
    delivery: DeliveryFeeCalculator,
    pricing: PricingAssembler,
    orders: OrderService,
    payments: PaymentService,
    notifier: Option<Arc<dyn NotificationDispatcher>>,
    clock: Arc<dyn Clock>,
    side_effect_timeout: Duration,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        coupons: CouponService,
        delivery: DeliveryFeeCalculator,
        pricing: PricingAssembler,
        orders: OrderService,
        payments: PaymentService,
        notifier: Option<Arc<dyn NotificationDispatcher>>,
        clock: Arc<dyn Clock>,
        side_effect_timeout: Duration,
    ) -> Self {
        Self {
            coupons,
            delivery,
            pricing,
            orders,
            payments,
            notifier,
            clock,
            side_effect_timeout,
        }
    }

    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, items = request.items.len()))]
    pub async fn place_order(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, ServiceError> {
        request.validate()?;
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        let now = self.clock.now();
        let subtotal = pricing::subtotal(&request.items)?;

        let coupon = match request
            .coupon_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
        {
            Some(code) => Some(self.coupons.price_for_checkout(code, subtotal).await?),
            None => None,
        };
        let discount = coupon.as_ref().map_or(Decimal::ZERO, |(_, amount)| *amount);

        let quote = self.delivery.quote(subtotal, now)?;
        let price = self
            .pricing
            .assemble(&request.items, quote.delivery_charge, discount)?;

        let order = self
            .orders
            .create(NewOrder {
                customer_id: request.customer_id,
                customer_name: request.customer_name,
                customer_phone: request.customer_phone,
                customer_email: request.customer_email,
                delivery_address: request.delivery_address,
                items: request.items,
                price,
                delivery_fee: quote.delivery_charge,
                discount,
                coupon_code: coupon.as_ref().map(|(c, _)| c.code.clone()),
                payment_method: request.payment_method,
                order_notes: request.order_notes,
            })
            .await?;

        if let Some((coupon, _)) = &coupon {
            self.claim_coupon(&order, coupon.id).await?;
        }

        let (order, payment) = self.attach_payment(&order, request.payment_details).await?;
        let order = self
            .orders
            .advance(order.id, OrderStatus::Confirmed, Some(SYSTEM_ACTOR.to_string()))
            .await?;

        info!(
            order_number = %order.order_number,
            total = %order.total_amount,
            discount = %discount,
            "Order placed"
        );
        self.notify_in_background(order.clone(), payment.clone());

        Ok(CheckoutReceipt {
            success: true,
            message: "Order placed successfully!".to_string(),
            order: PlacedOrder {
                id: order.id,
                order_number: order.order_number,
                total_amount: order.total_amount,
                status: order.status,
                payment_status: payment.status,
                payment_id: payment.id,
            },
            delivery: quote,
            discount,
        })
    }

    /// Claims one coupon use for a freshly created order; the order is discarded if the
    /// coupon ran out in the meantime.
    async fn claim_coupon(&self, order: &Order, coupon_id: Uuid) -> Result<(), ServiceError> {
        let claimed = match self.coupons.record_usage(coupon_id).await {
            Ok(claimed) => claimed,
            Err(e) => {
                self.discard(order).await;
                return Err(e);
            }
        };
        if !claimed {
            self.discard(order).await;
            return Err(ServiceError::Conflict(
                "Coupon usage limit reached".to_string(),
            ));
        }
        Ok(())
    }

    async fn discard(&self, order: &Order) {
        if let Err(e) = self.orders.discard_pending(order).await {
            error!(order_number = %order.order_number, error = %e, "Failed to discard pending order");
        }
    }

    async fn attach_payment(
        &self,
        order: &Order,
        details: PaymentMethodDetails,
    ) -> Result<(Order, Payment), ServiceError> {
        let attempt = tokio::time::timeout(
            self.side_effect_timeout,
            self.payments.attach_payment(order, details),
        )
        .await;
        match attempt {
            Ok(Ok(attached)) => Ok(attached),
            Ok(Err(e)) => {
                error!(order_number = %order.order_number, error = %e, "Payment attach failed, order left pending");
                Err(ServiceError::ExternalServiceError(format!(
                    "Payment failed for order {}",
                    order.order_number
                )))
            }
            Err(_) => {
                metrics::counter!("fresheats.side_effects.timeouts", 1, "effect" => "payment");
                error!(order_number = %order.order_number, "Payment attach timed out, order left pending");
                Err(ServiceError::ExternalServiceError(format!(
                    "Payment timed out for order {}",
                    order.order_number
                )))
            }
        }
    }

    /// Fire-and-forget admin alert bounded by the side-effect timeout.
    pub(crate) fn notify_in_background(&self, order: Order, payment: Payment) -> Option<JoinHandle<()>> {
        let notifier = self.notifier.clone()?;
        let timeout = self.side_effect_timeout;
        Some(tokio::spawn(async move {
            match tokio::time::timeout(timeout, notifier.notify_admin_new_order(&order, &payment)).await {
                Ok(Ok(report)) => info!(
                    order_number = %order.order_number,
                    sms = report.sms.success,
                    whatsapp = report.whatsapp.success,
                    "Admin notified"
                ),
                Ok(Err(e)) => warn!(order_number = %order.order_number, error = %e, "Admin notification failed"),
                Err(_) => {
                    metrics::counter!("fresheats.side_effects.timeouts", 1, "effect" => "notification");
                    warn!(order_number = %order.order_number, "Admin notification timed out")
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FixedClock;
    use crate::config::DeliveryConfig;
    use crate::models::{fixtures, Coupon, DiscountType};
    use crate::notifications::{ChannelOutcome, DispatchReport, MockNotificationDispatcher};
    use crate::repositories::{CouponRepository, InMemoryStore, OrderRepository};
    use crate::services::sequence::{SequenceAllocator, SequenceStrategy};
    use crate::services::ServiceSettings;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    struct Harness {
        store: Arc<InMemoryStore>,
        checkout: CheckoutService,
    }

    fn harness(notifier: Option<Arc<dyn NotificationDispatcher>>) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        // 10:00 IST, off peak
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(fixtures::at(2025, 3, 1, 4, 30)));
        let settings = ServiceSettings::default();
        let orders = OrderService::new(
            store.clone(),
            store.clone(),
            SequenceAllocator::new(store.clone(), SequenceStrategy::Counter),
            clock.clone(),
            None,
            settings.clone(),
        );
        let payments = PaymentService::new(store.clone(), store.clone(), orders.clone(), clock.clone());
        let checkout = CheckoutService::new(
            CouponService::new(store.clone(), clock.clone()),
            DeliveryFeeCalculator::new(DeliveryConfig::default(), settings.utc_offset, clock.clone()),
            PricingAssembler::new(settings.gst_percentage),
            orders,
            payments,
            notifier,
            clock,
            settings.side_effect_timeout,
        );
        Harness { store, checkout }
    }

    fn request(method: PaymentMethod) -> CheckoutRequest {
        CheckoutRequest {
            customer_id: Uuid::new_v4(),
            customer_name: "Asha Rao".into(),
            customer_phone: "9876543210".into(),
            customer_email: Some("asha@example.com".into()),
            delivery_address: fixtures::address(),
            items: vec![fixtures::item("Veg Biryani", 2, dec!(120))],
            payment_method: method,
            payment_details: PaymentMethodDetails {
                upi_id: Some("asha@upi".into()),
                ..Default::default()
            },
            coupon_code: None,
            order_notes: None,
        }
    }

    async fn seed_coupon(store: &InMemoryStore, usage_limit: Option<u32>) -> Coupon {
        let coupon = Coupon {
            id: Uuid::new_v4(),
            code: "FRESH10".into(),
            description: None,
            discount_type: DiscountType::Percentage,
            discount_value: dec!(10),
            min_order_value: dec!(100),
            max_discount: Some(dec!(50)),
            valid_from: fixtures::at(2025, 1, 1, 0, 0),
            valid_to: fixtures::at(2025, 12, 31, 0, 0),
            usage_limit,
            used_count: 0,
            is_active: true,
            created_at: fixtures::at(2025, 1, 1, 0, 0),
            updated_at: fixtures::at(2025, 1, 1, 0, 0),
        };
        store.insert_coupon(&coupon).await.unwrap();
        coupon
    }

    #[tokio::test]
    async fn online_payment_confirms_and_marks_paid() {
        let h = harness(None);
        let receipt = h.checkout.place_order(request(PaymentMethod::Upi)).await.unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.order.order_number, "ORD-2025-000001");
        assert_eq!(receipt.order.status, OrderStatus::Confirmed);
        assert_eq!(receipt.order.payment_status, PaymentStatus::Success);
        // 240 + 30 delivery + 12 GST
        assert_eq!(receipt.order.total_amount, dec!(282));

        let stored = h.store.find_order(receipt.order.id).await.unwrap().unwrap();
        assert!(stored.is_paid);
        assert_eq!(stored.payment_id, Some(receipt.order.payment_id));
        assert_eq!(stored.status_history.len(), 2);
        assert_eq!(stored.status_history[1].updated_by.as_deref(), Some("system"));
    }

    #[tokio::test]
    async fn cash_on_delivery_stays_unpaid() {
        let h = harness(None);
        let receipt = h.checkout.place_order(request(PaymentMethod::Cod)).await.unwrap();
        assert_eq!(receipt.order.payment_status, PaymentStatus::Pending);
        let stored = h.store.find_order(receipt.order.id).await.unwrap().unwrap();
        assert!(!stored.is_paid);
        assert_eq!(stored.paid_at, None);
    }

    #[tokio::test]
    async fn coupon_discount_is_applied_and_claimed() {
        let h = harness(None);
        seed_coupon(&h.store, Some(5)).await;
        let mut req = request(PaymentMethod::Card);
        req.coupon_code = Some("fresh10".into());

        let receipt = h.checkout.place_order(req).await.unwrap();
        assert_eq!(receipt.discount, dec!(24));
        // 240 + 30 - 24 + 12
        assert_eq!(receipt.order.total_amount, dec!(258));

        let coupon = h.store.find_coupon_by_code("FRESH10").await.unwrap().unwrap();
        assert_eq!(coupon.used_count, 1);
        let stored = h.store.find_order(receipt.order.id).await.unwrap().unwrap();
        assert_eq!(stored.coupon_code.as_deref(), Some("FRESH10"));
    }

    #[tokio::test]
    async fn exhausted_coupon_discards_the_order() {
        let h = harness(None);
        seed_coupon(&h.store, Some(1)).await;
        let mut first = request(PaymentMethod::Upi);
        first.coupon_code = Some("FRESH10".into());
        h.checkout.place_order(first.clone()).await.unwrap();

        // The second checkout fails validation before any order is created
        assert_matches!(
            h.checkout.place_order(first).await,
            Err(ServiceError::ValidationError(msg)) if msg == "Coupon usage limit reached"
        );
        let orders = h
            .store
            .find_orders(&crate::models::OrderFilter::default())
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
    }

    #[tokio::test]
    async fn lost_claim_race_removes_the_pending_order() {
        let h = harness(None);
        let coupon = seed_coupon(&h.store, Some(1)).await;
        let order = h
            .checkout
            .orders
            .create(NewOrder {
                customer_id: Uuid::new_v4(),
                customer_name: "Ravi".into(),
                customer_phone: "9000000000".into(),
                customer_email: None,
                delivery_address: fixtures::address(),
                items: vec![fixtures::item("Idli", 1, dec!(150))],
                price: pricing::PriceBreakdown {
                    subtotal: dec!(150),
                    gst_amount: dec!(7.50),
                    gst_percentage: dec!(5),
                    total_amount: dec!(172.50),
                },
                delivery_fee: dec!(30),
                discount: dec!(15),
                coupon_code: Some("FRESH10".into()),
                payment_method: PaymentMethod::Upi,
                order_notes: None,
            })
            .await
            .unwrap();
        // Someone else took the last use
        assert!(h.store.claim_coupon_usage(coupon.id, fixtures::at(2025, 3, 1, 4, 30)).await.unwrap());

        assert_matches!(
            h.checkout.claim_coupon(&order, coupon.id).await,
            Err(ServiceError::Conflict(_))
        );
        assert!(h.store.find_order(order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let h = harness(None);
        let mut req = request(PaymentMethod::Upi);
        req.items.clear();
        assert_matches!(
            h.checkout.place_order(req).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn overflowing_cart_is_a_validation_error() {
        let h = harness(None);
        let mut req = request(PaymentMethod::Upi);
        req.items = vec![fixtures::item("X", 2, Decimal::MAX)];
        let outcome = tokio::spawn({
            let checkout = h.checkout.clone();
            async move { checkout.place_order(req).await }
        })
        .await
        .expect("checkout must not panic");
        assert_matches!(outcome, Err(ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn admin_is_notified_after_checkout() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut notifier = MockNotificationDispatcher::new();
        notifier
            .expect_notify_admin_new_order()
            .times(1)
            .returning(move |order, _| {
                let _ = tx.send(order.order_number.clone());
                Ok(DispatchReport {
                    sms: ChannelOutcome::default(),
                    whatsapp: ChannelOutcome::default(),
                })
            });
        let h = harness(Some(Arc::new(notifier)));

        let receipt = h.checkout.place_order(request(PaymentMethod::Upi)).await.unwrap();
        let notified = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notified, receipt.order.order_number);
    }
}
