use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::models::OrderItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub gst_amount: Decimal,
    pub gst_percentage: Decimal,
    pub total_amount: Decimal,
}

/// Largest order value any pricing input may carry
pub const MAX_ORDER_VALUE: Decimal = dec!(1000000000000);

/// Rejects order values a client could not have produced from a real cart.
pub fn check_order_value(value: Decimal) -> Result<(), ServiceError> {
    if value < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Order value cannot be negative".to_string(),
        ));
    }
    if value > MAX_ORDER_VALUE {
        return Err(out_of_range());
    }
    Ok(())
}

fn out_of_range() -> ServiceError {
    ServiceError::ValidationError("Order value is out of range".to_string())
}

/// Σ unit_price × quantity. Lines outside the accepted bounds are rejected before any arithmetic.
pub fn subtotal(items: &[OrderItem]) -> Result<Decimal, ServiceError> {
    items.iter().try_fold(Decimal::ZERO, |acc, item| {
        acc.checked_add(item.line_total()?).ok_or_else(out_of_range)
    })
}

/// Tax on `amount` at `percentage`, to two decimal places.
pub fn gst_on(amount: Decimal, percentage: Decimal) -> Decimal {
    (amount * percentage / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Turns a cart plus fee and discount into the stored price fields.
#[derive(Debug, Clone, Copy)]
pub struct PricingAssembler {
    gst_percentage: Decimal,
}

impl PricingAssembler {
    pub fn new(gst_percentage: Decimal) -> Self {
        Self { gst_percentage }
    }

    pub fn gst_percentage(&self) -> Decimal {
        self.gst_percentage
    }

    pub fn assemble(
        &self,
        items: &[OrderItem],
        delivery_fee: Decimal,
        discount: Decimal,
    ) -> Result<PriceBreakdown, ServiceError> {
        if delivery_fee < Decimal::ZERO || discount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Delivery fee and discount cannot be negative".to_string(),
            ));
        }

        let subtotal = subtotal(items)?;
        let gst_amount = subtotal
            .checked_mul(self.gst_percentage)
            .map(|taxed| {
                (taxed / Decimal::ONE_HUNDRED)
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            })
            .ok_or_else(out_of_range)?;
        let total_amount = subtotal
            .checked_add(delivery_fee)
            .and_then(|t| t.checked_add(gst_amount))
            .and_then(|t| t.checked_sub(discount))
            .ok_or_else(out_of_range)?
            .max(Decimal::ZERO);

        Ok(PriceBreakdown {
            subtotal,
            gst_amount,
            gst_percentage: self.gst_percentage,
            total_amount,
        })
    }
}
