use chrono::{FixedOffset, Offset, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

use crate::config::{AppConfig, DeliveryConfig};

// Numbering and pricing
pub mod coupons;
pub mod delivery;
pub mod pricing;
pub mod sequence;

// Order lifecycle
pub mod checkout;
pub mod orders;
pub mod payments;

// Billing
pub mod invoice_renderer;
pub mod invoicing;

// Reviews and ratings
pub mod ratings;
pub mod reviews;

// Dashboard figures
pub mod analytics;

// Service factory for dependency injection
pub mod factory;

pub use factory::{ServiceContainer, ServiceFactory};

/// Knobs shared by the services, resolved once from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Business calendar used for year scoping, peak hours and month boundaries
    pub utc_offset: FixedOffset,
    pub gst_percentage: Decimal,
    pub transition_policy: orders::TransitionPolicy,
    pub sequence_strategy: sequence::SequenceStrategy,
    pub sequence_attempts: u32,
    /// Upper bound for best-effort side effects
    pub side_effect_timeout: Duration,
    pub delivery: DeliveryConfig,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            utc_offset: FixedOffset::east_opt(330 * 60).unwrap_or_else(|| Utc.fix()),
            gst_percentage: dec!(5),
            transition_policy: orders::TransitionPolicy::default(),
            sequence_strategy: sequence::SequenceStrategy::default(),
            sequence_attempts: 3,
            side_effect_timeout: Duration::from_millis(2_000),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl From<&AppConfig> for ServiceSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            utc_offset: cfg.local_offset(),
            gst_percentage: cfg.pricing.gst_percentage,
            transition_policy: cfg.orders.transition_policy,
            sequence_strategy: cfg.sequence.strategy,
            sequence_attempts: cfg.sequence.max_attempts,
            side_effect_timeout: cfg.side_effect_timeout(),
            delivery: cfg.delivery.clone(),
        }
    }
}
