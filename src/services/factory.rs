use std::sync::Arc;

use crate::{
    common::Clock,
    events::EventSender,
    notifications::NotificationDispatcher,
    repositories::Repositories,
    services::{
        analytics::AnalyticsService, checkout::CheckoutService, coupons::CouponService,
        delivery::DeliveryFeeCalculator, invoicing::InvoicingService, orders::OrderService,
        payments::PaymentService, pricing::PricingAssembler, reviews::ReviewService,
        sequence::SequenceAllocator, ServiceSettings,
    },
};

/// Factory for creating service instances with shared dependencies
pub struct ServiceFactory {
    repositories: Repositories,
    settings: ServiceSettings,
    clock: Arc<dyn Clock>,
    event_sender: Option<Arc<EventSender>>,
    notifier: Option<Arc<dyn NotificationDispatcher>>,
}

impl ServiceFactory {
    pub fn new(repositories: Repositories, settings: ServiceSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            repositories,
            settings,
            clock,
            event_sender: None,
            notifier: None,
        }
    }

    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(Arc::new(sender));
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    fn allocator(&self) -> SequenceAllocator {
        SequenceAllocator::new(
            self.repositories.sequences.clone(),
            self.settings.sequence_strategy,
        )
    }

    pub fn order_service(&self) -> OrderService {
        OrderService::new(
            self.repositories.orders.clone(),
            self.repositories.payments.clone(),
            self.allocator(),
            self.clock.clone(),
            self.event_sender.clone(),
            self.settings.clone(),
        )
    }

    pub fn payment_service(&self) -> PaymentService {
        PaymentService::new(
            self.repositories.orders.clone(),
            self.repositories.payments.clone(),
            self.order_service(),
            self.clock.clone(),
        )
    }

    pub fn coupon_service(&self) -> CouponService {
        CouponService::new(self.repositories.coupons.clone(), self.clock.clone())
    }

    pub fn delivery_calculator(&self) -> DeliveryFeeCalculator {
        DeliveryFeeCalculator::new(
            self.settings.delivery.clone(),
            self.settings.utc_offset,
            self.clock.clone(),
        )
    }

    pub fn checkout_service(&self) -> CheckoutService {
        CheckoutService::new(
            self.coupon_service(),
            self.delivery_calculator(),
            PricingAssembler::new(self.settings.gst_percentage),
            self.order_service(),
            self.payment_service(),
            self.notifier.clone(),
            self.clock.clone(),
            self.settings.side_effect_timeout,
        )
    }

    pub fn invoicing_service(&self) -> InvoicingService {
        InvoicingService::new(
            self.repositories.orders.clone(),
            self.allocator(),
            self.settings.clone(),
        )
    }

    pub fn review_service(&self) -> ReviewService {
        ReviewService::new(
            self.repositories.orders.clone(),
            self.repositories.reviews.clone(),
            self.repositories.foods.clone(),
            self.clock.clone(),
            self.event_sender.clone(),
            self.settings.side_effect_timeout,
        )
    }

    pub fn analytics_service(&self) -> AnalyticsService {
        AnalyticsService::new(
            self.repositories.orders.clone(),
            self.repositories.reviews.clone(),
            self.clock.clone(),
            self.settings.utc_offset,
        )
    }

    pub fn build(&self) -> ServiceContainer {
        ServiceContainer {
            orders: Arc::new(self.order_service()),
            payments: Arc::new(self.payment_service()),
            coupons: Arc::new(self.coupon_service()),
            delivery: Arc::new(self.delivery_calculator()),
            checkout: Arc::new(self.checkout_service()),
            invoicing: Arc::new(self.invoicing_service()),
            reviews: Arc::new(self.review_service()),
            analytics: Arc::new(self.analytics_service()),
        }
    }
}

/// Service container holding all service instances
#[derive(Clone)]
pub struct ServiceContainer {
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub coupons: Arc<CouponService>,
    pub delivery: Arc<DeliveryFeeCalculator>,
    pub checkout: Arc<CheckoutService>,
    pub invoicing: Arc<InvoicingService>,
    pub reviews: Arc<ReviewService>,
    pub analytics: Arc<AnalyticsService>,
}

impl ServiceContainer {
    /// Runs one reconciliation pass: stranded payments first, then estimated ratings.
    pub async fn reconcile(&self, payment_grace: std::time::Duration) -> (usize, usize) {
        let payments = match self.payments.reconcile_unpaid(payment_grace).await {
            Ok(repaired) => repaired,
            Err(e) => {
                tracing::warn!(error = %e, "Payment reconciliation sweep failed");
                0
            }
        };
        let ratings = match self.reviews.aggregator().reconcile_estimated().await {
            Ok(fixed) => fixed,
            Err(e) => {
                tracing::warn!(error = %e, "Rating reconciliation sweep failed");
                0
            }
        };
        (payments, ratings)
    }
}
