use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::common::{local_hour, Clock};
use crate::config::{DeliveryConfig, PeakWindow};
use crate::errors::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryQuote {
    pub delivery_charge: Decimal,
    pub is_free_delivery: bool,
    pub is_peak_hour: bool,
    pub base_charge: Decimal,
    pub peak_surcharge: Decimal,
    pub amount_for_free_delivery: Decimal,
    pub free_delivery_threshold: Decimal,
    pub message: String,
}

/// Public view of the active delivery policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    pub free_delivery_threshold: Decimal,
    pub base_charge: Decimal,
    pub peak_hour_surcharge: Decimal,
    pub peak_hours: Vec<PeakWindow>,
    pub is_peak_hour: bool,
}

/// Delivery fee calculator. Pure apart from the clock used by the `*_now` helpers.
#[derive(Clone)]
pub struct DeliveryFeeCalculator {
    config: DeliveryConfig,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
}

impl DeliveryFeeCalculator {
    pub fn new(config: DeliveryConfig, offset: FixedOffset, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            offset,
            clock,
        }
    }

    pub fn is_peak_hour(&self, at: DateTime<Utc>) -> bool {
        let hour = local_hour(at, self.offset);
        self.config.peak_windows.iter().any(|w| w.contains(hour))
    }

    /// Quote for an order worth `order_value` placed at `at`.
    pub fn quote(&self, order_value: Decimal, at: DateTime<Utc>) -> Result<DeliveryQuote, ServiceError> {
        if order_value < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Order value cannot be negative".to_string(),
            ));
        }
        let cfg = &self.config;
        let peak = self.is_peak_hour(at);

        if order_value >= cfg.free_delivery_threshold {
            return Ok(DeliveryQuote {
                delivery_charge: Decimal::ZERO,
                is_free_delivery: true,
                is_peak_hour: peak,
                base_charge: cfg.base_charge,
                peak_surcharge: Decimal::ZERO,
                amount_for_free_delivery: Decimal::ZERO,
                free_delivery_threshold: cfg.free_delivery_threshold,
                message: format!(
                    "Free delivery on orders above Rs.{}",
                    cfg.free_delivery_threshold.normalize()
                ),
            });
        }

        let peak_surcharge = if peak {
            cfg.peak_hour_surcharge
        } else {
            Decimal::ZERO
        };
        let message = if peak {
            format!(
                "Delivery charge includes Rs.{} peak hour surcharge",
                cfg.peak_hour_surcharge.normalize()
            )
        } else {
            "Standard delivery charge".to_string()
        };

        Ok(DeliveryQuote {
            delivery_charge: cfg.base_charge + peak_surcharge,
            is_free_delivery: false,
            is_peak_hour: peak,
            base_charge: cfg.base_charge,
            peak_surcharge,
            amount_for_free_delivery: (cfg.free_delivery_threshold - order_value)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
            free_delivery_threshold: cfg.free_delivery_threshold,
            message,
        })
    }

    pub fn quote_now(&self, order_value: Decimal) -> Result<DeliveryQuote, ServiceError> {
        self.quote(order_value, self.clock.now())
    }

    pub fn config(&self) -> DeliveryPolicy {
        DeliveryPolicy {
            free_delivery_threshold: self.config.free_delivery_threshold,
            base_charge: self.config.base_charge,
            peak_hour_surcharge: self.config.peak_hour_surcharge,
            peak_hours: self.config.peak_windows.clone(),
            is_peak_hour: self.is_peak_hour(self.clock.now()),
        }
    }
}
