use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::pricing::check_order_value;
use crate::common::Clock;
use crate::errors::ServiceError;
use crate::models::{Coupon, CouponDraft, DiscountType};
use crate::repositories::CouponRepository;

/// Outcome of the eligibility checks. `reason` is set only when `valid` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponValidation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl CouponValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Eligibility of `coupon` for an order worth `order_value` at `now`. The first failing check wins.
pub fn validate(coupon: &Coupon, order_value: Decimal, now: DateTime<Utc>) -> CouponValidation {
    if !coupon.is_active {
        return CouponValidation::rejected("Coupon is not active");
    }
    if now < coupon.valid_from {
        return CouponValidation::rejected("Coupon is not yet valid");
    }
    if now > coupon.valid_to {
        return CouponValidation::rejected("Coupon has expired");
    }
    if coupon.usage_exhausted() {
        return CouponValidation::rejected("Coupon usage limit reached");
    }
    if order_value < coupon.min_order_value {
        return CouponValidation::rejected(format!(
            "Minimum order value of Rs.{} required",
            coupon.min_order_value.normalize()
        ));
    }
    CouponValidation::ok()
}

/// Raw discount, never more than the order value.
pub fn calculate_discount(coupon: &Coupon, order_value: Decimal) -> Decimal {
    let discount = match coupon.discount_type {
        DiscountType::Percentage => {
            let amount = order_value
                .checked_mul(coupon.discount_value)
                .map(|scaled| scaled / Decimal::ONE_HUNDRED)
                .or_else(|| {
                    (order_value / Decimal::ONE_HUNDRED).checked_mul(coupon.discount_value)
                })
                .unwrap_or(order_value);
            match coupon.max_discount {
                Some(cap) if amount > cap => cap,
                _ => amount,
            }
        }
        DiscountType::Flat => coupon.discount_value,
    };
    discount.min(order_value).max(Decimal::ZERO)
}

/// The amount actually taken off an order: whole units, still within the order value.
pub fn applied_discount(coupon: &Coupon, order_value: Decimal) -> Decimal {
    calculate_discount(coupon, order_value)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .min(order_value)
}

/// Result of checking a code against an order value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponCheck {
    pub valid: bool,
    pub message: String,
    pub discount_amount: Decimal,
    pub coupon: Coupon,
}

#[derive(Clone)]
pub struct CouponService {
    repository: Arc<dyn CouponRepository>,
    clock: Arc<dyn Clock>,
}

impl CouponService {
    pub fn new(repository: Arc<dyn CouponRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    fn check_draft(draft: &CouponDraft) -> Result<(), ServiceError> {
        draft.validate()?;
        if draft.discount_value <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Discount value must be positive".to_string(),
            ));
        }
        if draft.discount_type == DiscountType::Percentage
            && draft.discount_value > Decimal::ONE_HUNDRED
        {
            return Err(ServiceError::ValidationError(
                "Percentage discounts cannot exceed 100".to_string(),
            ));
        }
        if draft.min_order_value.map_or(false, |v| v < Decimal::ZERO)
            || draft.max_discount.map_or(false, |v| v < Decimal::ZERO)
        {
            return Err(ServiceError::ValidationError(
                "Coupon amounts cannot be negative".to_string(),
            ));
        }
        if draft.valid_to <= draft.valid_from {
            return Err(ServiceError::ValidationError(
                "valid_to must be after valid_from".to_string(),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self, draft), fields(code = %draft.code))]
    pub async fn create(&self, draft: CouponDraft) -> Result<Coupon, ServiceError> {
        Self::check_draft(&draft)?;
        let now = self.clock.now();
        let coupon = Coupon {
            id: Uuid::new_v4(),
            code: Coupon::normalize_code(&draft.code),
            description: draft.description,
            discount_type: draft.discount_type,
            discount_value: draft.discount_value,
            min_order_value: draft.min_order_value.unwrap_or(Decimal::ZERO),
            max_discount: draft.max_discount,
            valid_from: draft.valid_from,
            valid_to: draft.valid_to,
            usage_limit: draft.usage_limit,
            used_count: 0,
            is_active: draft.is_active,
            created_at: now,
            updated_at: now,
        };
        self.repository.insert_coupon(&coupon).await?;
        info!(coupon_id = %coupon.id, "Coupon created");
        Ok(coupon)
    }

    #[instrument(skip(self, draft))]
    pub async fn update(&self, id: Uuid, draft: CouponDraft) -> Result<Coupon, ServiceError> {
        Self::check_draft(&draft)?;
        let existing = self.get(id).await?;
        let coupon = Coupon {
            code: Coupon::normalize_code(&draft.code),
            description: draft.description,
            discount_type: draft.discount_type,
            discount_value: draft.discount_value,
            min_order_value: draft.min_order_value.unwrap_or(Decimal::ZERO),
            max_discount: draft.max_discount,
            valid_from: draft.valid_from,
            valid_to: draft.valid_to,
            usage_limit: draft.usage_limit,
            is_active: draft.is_active,
            updated_at: self.clock.now(),
            ..existing
        };
        self.repository.save_coupon(&coupon).await?;
        Ok(coupon)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        if !self.repository.delete_coupon(id).await? {
            return Err(ServiceError::NotFound(format!("Coupon {} not found", id)));
        }
        info!(coupon_id = %id, "Coupon deleted");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Coupon, ServiceError> {
        self.repository
            .find_coupon(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", id)))
    }

    pub async fn list(&self) -> Result<Vec<Coupon>, ServiceError> {
        self.repository.list_coupons().await
    }

    /// Looks a code up and prices it. Unknown codes are NotFound; ineligible ones come back
    /// with `valid == false` and the reason as the message.
    #[instrument(skip(self))]
    pub async fn validate_code(
        &self,
        code: &str,
        order_value: Decimal,
    ) -> Result<CouponCheck, ServiceError> {
        check_order_value(order_value)?;
        let code = Coupon::normalize_code(code);
        if code.is_empty() {
            return Err(ServiceError::ValidationError(
                "Coupon code is required".to_string(),
            ));
        }
        let coupon = self
            .repository
            .find_coupon_by_code(&code)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Coupon code not found".to_string()))?;

        let validation = validate(&coupon, order_value, self.clock.now());
        match validation.reason {
            Some(reason) => Ok(CouponCheck {
                valid: false,
                message: reason,
                discount_amount: Decimal::ZERO,
                coupon,
            }),
            None => Ok(CouponCheck {
                valid: true,
                message: "Coupon applied successfully".to_string(),
                discount_amount: applied_discount(&coupon, order_value),
                coupon,
            }),
        }
    }

    /// Checkout variant of [`validate_code`](Self::validate_code): ineligibility is an error.
    pub async fn price_for_checkout(
        &self,
        code: &str,
        order_value: Decimal,
    ) -> Result<(Coupon, Decimal), ServiceError> {
        let check = self.validate_code(code, order_value).await?;
        if !check.valid {
            return Err(ServiceError::ValidationError(check.message));
        }
        Ok((check.coupon, check.discount_amount))
    }

    /// Consumes one use of the coupon. Returns false when the usage cap was already reached.
    #[instrument(skip(self))]
    pub async fn record_usage(&self, coupon_id: Uuid) -> Result<bool, ServiceError> {
        let claimed = self
            .repository
            .claim_coupon_usage(coupon_id, self.clock.now())
            .await?;
        if !claimed {
            counter!("fresheats.coupons.claims_rejected", 1);
            warn!(coupon_id = %coupon_id, "Coupon usage claim rejected at the cap");
        }
        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FixedClock;
    use crate::models::fixtures::at;
    use crate::repositories::InMemoryStore;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn coupon(discount_type: DiscountType, value: Decimal) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: "FRESH10".into(),
            description: None,
            discount_type,
            discount_value: value,
            min_order_value: dec!(0),
            max_discount: None,
            valid_from: at(2025, 1, 1, 0, 0),
            valid_to: at(2025, 12, 31, 23, 59),
            usage_limit: None,
            used_count: 0,
            is_active: true,
            created_at: at(2025, 1, 1, 0, 0),
            updated_at: at(2025, 1, 1, 0, 0),
        }
    }

    fn draft(code: &str) -> CouponDraft {
        CouponDraft {
            code: code.into(),
            description: Some("Ten percent off".into()),
            discount_type: DiscountType::Percentage,
            discount_value: dec!(10),
            min_order_value: Some(dec!(200)),
            max_discount: Some(dec!(50)),
            valid_from: at(2025, 1, 1, 0, 0),
            valid_to: at(2025, 12, 31, 0, 0),
            usage_limit: Some(1),
            is_active: true,
        }
    }

    fn service() -> CouponService {
        CouponService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(FixedClock::new(at(2025, 6, 1, 12, 0))),
        )
    }

    #[test]
    fn first_failing_check_wins() {
        let mut c = coupon(DiscountType::Flat, dec!(50));
        c.is_active = false;
        c.valid_to = at(2024, 1, 1, 0, 0);
        let v = validate(&c, dec!(500), at(2025, 6, 1, 0, 0));
        assert_eq!(v.reason.as_deref(), Some("Coupon is not active"));
    }

    #[rstest]
    #[case(at(2024, 12, 31, 0, 0), Some("Coupon is not yet valid"))]
    #[case(at(2026, 1, 1, 0, 0), Some("Coupon has expired"))]
    #[case(at(2025, 6, 1, 0, 0), None)]
    fn validity_window(#[case] now: DateTime<Utc>, #[case] reason: Option<&str>) {
        let c = coupon(DiscountType::Flat, dec!(50));
        assert_eq!(validate(&c, dec!(500), now).reason.as_deref(), reason);
    }

    #[test]
    fn usage_limit_and_minimum_value() {
        let mut c = coupon(DiscountType::Flat, dec!(50));
        c.min_order_value = dec!(200.00);
        let now = at(2025, 6, 1, 0, 0);
        assert_eq!(
            validate(&c, dec!(150), now).reason.as_deref(),
            Some("Minimum order value of Rs.200 required")
        );
        c.usage_limit = Some(3);
        c.used_count = 3;
        assert_eq!(
            validate(&c, dec!(150), now).reason.as_deref(),
            Some("Coupon usage limit reached")
        );
    }

    #[test]
    fn percentage_discount_is_capped() {
        let mut c = coupon(DiscountType::Percentage, dec!(10));
        c.max_discount = Some(dec!(50));
        assert_eq!(calculate_discount(&c, dec!(1000)), dec!(50));
        assert_eq!(calculate_discount(&c, dec!(300)), dec!(30));
    }

    #[test]
    fn percentage_of_an_enormous_value_does_not_overflow() {
        let c = coupon(DiscountType::Percentage, dec!(50));
        let discount = calculate_discount(&c, Decimal::MAX);
        assert!(discount > Decimal::ZERO);
        assert!(discount <= Decimal::MAX);
    }

    #[test]
    fn flat_discount_never_exceeds_order_value() {
        let c = coupon(DiscountType::Flat, dec!(100));
        assert_eq!(calculate_discount(&c, dec!(80)), dec!(80));
        assert_eq!(applied_discount(&c, dec!(80)), dec!(80));
    }

    #[test]
    fn applied_discount_rounds_half_away_from_zero() {
        let c = coupon(DiscountType::Percentage, dec!(15));
        // 15% of 123 = 18.45
        assert_eq!(applied_discount(&c, dec!(123)), dec!(18));
        // 15% of 125 = 18.75
        assert_eq!(applied_discount(&c, dec!(125)), dec!(19));
        let half = coupon(DiscountType::Flat, dec!(12.5));
        assert_eq!(applied_discount(&half, dec!(100)), dec!(13));
    }

    #[tokio::test]
    async fn codes_are_uppercased_and_unique() {
        let service = service();
        let created = service.create(draft("fresh10")).await.unwrap();
        assert_eq!(created.code, "FRESH10");
        assert_matches!(
            service.create(draft("FRESH10")).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn invalid_drafts_are_rejected() {
        let service = service();
        let mut bad = draft("BAD1");
        bad.discount_value = dec!(120);
        assert_matches!(service.create(bad).await, Err(ServiceError::ValidationError(_)));

        let mut inverted = draft("BAD2");
        inverted.valid_to = inverted.valid_from;
        assert_matches!(
            service.create(inverted).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn validate_code_prices_eligible_orders() {
        let service = service();
        service.create(draft("FRESH10")).await.unwrap();

        let check = service.validate_code(" fresh10 ", dec!(345)).await.unwrap();
        assert!(check.valid);
        assert_eq!(check.discount_amount, dec!(35));

        let check = service.validate_code("FRESH10", dec!(150)).await.unwrap();
        assert!(!check.valid);
        assert_eq!(check.message, "Minimum order value of Rs.200 required");

        assert_matches!(
            service.validate_code("NOPE", dec!(500)).await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            service.validate_code("FRESH10", Decimal::MAX).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            service.price_for_checkout("FRESH10", dec!(150)).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn usage_claims_stop_at_the_limit() {
        let service = service();
        let created = service.create(draft("ONCE")).await.unwrap();
        assert!(service.record_usage(created.id).await.unwrap());
        assert!(!service.record_usage(created.id).await.unwrap());
        assert_eq!(service.get(created.id).await.unwrap().used_count, 1);
    }

    #[tokio::test]
    async fn update_keeps_usage_and_delete_removes() {
        let service = service();
        let created = service.create(draft("KEEP")).await.unwrap();
        service.record_usage(created.id).await.unwrap();

        let mut changed = draft("KEEP");
        changed.discount_value = dec!(20);
        let updated = service.update(created.id, changed).await.unwrap();
        assert_eq!(updated.used_count, 1);
        assert_eq!(updated.discount_value, dec!(20));

        service.delete(created.id).await.unwrap();
        assert_matches!(service.get(created.id).await, Err(ServiceError::NotFound(_)));
        assert_matches!(service.delete(created.id).await, Err(ServiceError::NotFound(_)));
    }
}
