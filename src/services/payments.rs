use chrono::{DateTime, Utc};
use metrics::counter;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::orders::OrderService;
use crate::common::Clock;
use crate::errors::ServiceError;
use crate::models::{
    Order, OrderStatus, Payment, PaymentMethod, PaymentMethodDetails, PaymentStatus, RefundRecord,
};
use crate::repositories::{OrderRepository, PaymentRepository};

const REFERENCE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const LINK_ATTEMPTS: u32 = 3;
pub const SYSTEM_ACTOR: &str = "system";

/// `<PREFIX>_<epoch millis>_<9 uppercase alphanumerics>`
pub fn gateway_reference(prefix: &str, now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| REFERENCE_CHARSET[rng.gen_range(0..REFERENCE_CHARSET.len())] as char)
        .collect();
    format!("{}_{}_{}", prefix, now.timestamp_millis(), suffix)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundRequest {
    /// Defaults to the full payment amount
    pub amount: Option<Decimal>,
}

/// Simulated payment capture plus the repair paths around it.
#[derive(Clone)]
pub struct PaymentService {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    lifecycle: OrderService,
    clock: Arc<dyn Clock>,
}

impl PaymentService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        lifecycle: OrderService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders,
            payments,
            lifecycle,
            clock,
        }
    }

    /// Creates and links the order's payment. Returns the already linked payment when there
    /// is one, and links an orphaned payment left behind by an interrupted attempt.
    #[instrument(skip(self, order, details), fields(order_number = %order.order_number))]
    pub async fn attach_payment(
        &self,
        order: &Order,
        details: PaymentMethodDetails,
    ) -> Result<(Order, Payment), ServiceError> {
        if let Some(payment_id) = order.payment_id {
            if let Some(payment) = self.payments.find_payment(payment_id).await? {
                return Ok((order.clone(), payment));
            }
        }

        let payment = match self.payments.find_payment_for_order(order.id).await? {
            Some(existing) => existing,
            None => {
                let payment = self.new_payment(order, details);
                if let Err(e) = self.payments.insert_payment(&payment).await {
                    error!(error = %e, order_number = %order.order_number, "Failed to record payment");
                    return Err(ServiceError::ExternalServiceError(format!(
                        "Payment could not be recorded for order {}",
                        order.order_number
                    )));
                }
                payment
            }
        };

        let linked = self.link(order.id, &payment).await?;
        info!(payment_id = %payment.id, status = %payment.status, "Payment attached");
        Ok((linked, payment))
    }

    fn new_payment(&self, order: &Order, details: PaymentMethodDetails) -> Payment {
        let now = self.clock.now();
        let status = if order.payment_method.settles_at_checkout() {
            PaymentStatus::Success
        } else {
            PaymentStatus::Pending
        };
        Payment {
            id: Uuid::new_v4(),
            order_id: order.id,
            customer_id: order.customer_id,
            amount: order.total_amount,
            currency: "INR".to_string(),
            method: order.payment_method,
            status,
            gateway_reference: gateway_reference("PAY", now),
            method_details: details,
            refund: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Writes the payment link onto the order, reloading on version conflicts.
    async fn link(&self, order_id: Uuid, payment: &Payment) -> Result<Order, ServiceError> {
        let mut last_error = None;
        for _ in 0..LINK_ATTEMPTS {
            let mut order = self.lifecycle.get(order_id).await?;
            if order.payment_id == Some(payment.id) {
                return Ok(order);
            }
            let now = self.clock.now();
            order.payment_id = Some(payment.id);
            if payment.status == PaymentStatus::Success {
                order.is_paid = true;
                order.paid_at = Some(now);
            }
            order.updated_at = now;
            match self.orders.save_order(&order).await {
                Ok(saved) => return Ok(saved),
                Err(e @ ServiceError::ConcurrentModification(_)) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or(ServiceError::ConcurrentModification(order_id)))
    }

    /// Attaches the payment if missing and finishes confirmation of a Pending order.
    #[instrument(skip(self))]
    pub async fn retry_payment(&self, order_id: Uuid) -> Result<(Order, Payment), ServiceError> {
        let order = self.lifecycle.get(order_id).await?;
        if order.status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is cancelled",
                order.order_number
            )));
        }
        let (order, payment) = self
            .attach_payment(&order, PaymentMethodDetails::default())
            .await?;
        let order = if order.status == OrderStatus::Pending {
            self.lifecycle
                .advance(order.id, OrderStatus::Confirmed, Some(SYSTEM_ACTOR.to_string()))
                .await?
        } else {
            order
        };
        Ok((order, payment))
    }

    /// Repairs orders left Pending for longer than `grace`: attaches the missing payment if any
    /// and confirms the order. Returns how many were repaired; failures are logged and left for
    /// the next sweep.
    #[instrument(skip(self))]
    pub async fn reconcile_unpaid(&self, grace: Duration) -> Result<usize, ServiceError> {
        let grace = chrono::Duration::from_std(grace)
            .map_err(|e| ServiceError::InternalError(format!("Invalid grace period: {}", e)))?;
        let cutoff = self.clock.now() - grace;
        let stranded = self.orders.find_stale_pending_orders(cutoff).await?;

        let mut repaired = 0;
        for order in stranded {
            match self.retry_payment(order.id).await {
                Ok(_) => {
                    repaired += 1;
                    counter!("fresheats.reconciliation.repairs", 1, "kind" => "payment");
                }
                Err(e) => {
                    warn!(order_number = %order.order_number, error = %e, "Payment repair failed")
                }
            }
        }
        if repaired > 0 {
            info!(repaired, "Reconciled stale pending orders");
        }
        Ok(repaired)
    }

    pub async fn payment_for_order(&self, order_id: Uuid) -> Result<Payment, ServiceError> {
        self.payments
            .find_payment_for_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment for order {} not found", order_id)))
    }

    pub async fn history_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<Payment>, ServiceError> {
        self.payments.find_payments_for_customer(customer_id).await
    }

    /// Marks a cash-on-delivery order as paid once cash is collected.
    #[instrument(skip(self))]
    pub async fn settle_cash_on_delivery(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        let mut order = self.lifecycle.get(order_id).await?;
        if order.payment_method != PaymentMethod::Cod {
            return Err(ServiceError::InvalidOperation(
                "Only cash on delivery orders can be settled".to_string(),
            ));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is cancelled",
                order.order_number
            )));
        }
        if order.is_paid {
            return Ok(order);
        }
        let mut payment = self.payment_for_order(order_id).await?;

        let now = self.clock.now();
        order.is_paid = true;
        order.paid_at = Some(now);
        order.updated_at = now;
        let saved = self.orders.save_order(&order).await?;

        payment.status = PaymentStatus::Success;
        payment.updated_at = now;
        self.payments.save_payment(&payment).await?;

        info!(order_number = %saved.order_number, "Cash on delivery settled");
        Ok(saved)
    }

    /// Refunds a settled online payment, fully or in part.
    #[instrument(skip(self, request))]
    pub async fn refund(
        &self,
        order_id: Uuid,
        request: RefundRequest,
    ) -> Result<Payment, ServiceError> {
        let mut payment = self.payment_for_order(order_id).await?;
        if payment.method == PaymentMethod::Cod {
            return Err(ServiceError::InvalidOperation(
                "Cash on delivery payments cannot be refunded online".to_string(),
            ));
        }
        if payment.status != PaymentStatus::Success {
            return Err(ServiceError::InvalidOperation(format!(
                "Payment is {} and cannot be refunded",
                payment.status
            )));
        }

        let amount = request.amount.unwrap_or(payment.amount);
        if amount <= Decimal::ZERO || amount > payment.amount {
            return Err(ServiceError::ValidationError(format!(
                "Refund amount must be between 0 and {}",
                payment.amount
            )));
        }

        let now = self.clock.now();
        payment.status = PaymentStatus::Refunded;
        payment.refund = Some(RefundRecord {
            refund_id: gateway_reference("RFD", now),
            amount,
            status: "Processed".to_string(),
            refunded_at: now,
        });
        payment.updated_at = now;
        self.payments.save_payment(&payment).await?;

        info!(payment_id = %payment.id, amount = %amount, "Payment refunded");
        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn references_follow_the_gateway_format() {
        let now = crate::models::fixtures::at(2025, 3, 1, 10, 0);
        let reference = gateway_reference("PAY", now);
        let pattern = Regex::new(r"^PAY_\d{13}_[A-Z0-9]{9}$").unwrap();
        assert!(pattern.is_match(&reference), "{}", reference);
        assert!(reference.contains(&now.timestamp_millis().to_string()));
        assert_ne!(gateway_reference("PAY", now), reference);
    }
}
