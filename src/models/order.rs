use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::payment::PaymentMethod;
use crate::errors::ServiceError;

/// Enum representing the possible statuses of an order.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum OrderStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Confirmed")]
    Confirmed,
    #[sea_orm(string_value = "Preparing")]
    Preparing,
    #[sea_orm(string_value = "Out for Delivery")]
    #[serde(rename = "Out for Delivery")]
    #[strum(serialize = "Out for Delivery")]
    OutForDelivery,
    #[sea_orm(string_value = "Delivered")]
    Delivered,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// Delivered and Cancelled accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Position along the delivery path. Cancelled sits off the path.
    pub fn stage(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Preparing => Some(2),
            OrderStatus::OutForDelivery => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled => None,
        }
    }

    /// Parses a wire value, rejecting anything outside the enumerated set.
    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        OrderStatus::from_str(value.trim()).map_err(|_| {
            ServiceError::ValidationError(format!("Unknown order status '{}'", value))
        })
    }
}

/// Largest unit price accepted on a line item
pub const MAX_UNIT_PRICE: Decimal = dec!(1000000);
/// Largest quantity accepted on a line item
pub const MAX_ITEM_QUANTITY: u32 = 1_000;

/// Frozen copy of a catalog item taken at checkout. `food_id` is a lookup back-reference only;
/// name and price are never re-derived from the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct OrderItem {
    pub food_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
}

impl OrderItem {
    /// Rejects prices and quantities outside the accepted bounds.
    pub fn check_bounds(&self) -> Result<(), ServiceError> {
        if self.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Unit prices cannot be negative".to_string(),
            ));
        }
        if self.unit_price > MAX_UNIT_PRICE {
            return Err(ServiceError::ValidationError(format!(
                "Unit price of '{}' exceeds {}",
                self.name, MAX_UNIT_PRICE
            )));
        }
        if self.quantity < 1 || self.quantity > MAX_ITEM_QUANTITY {
            return Err(ServiceError::ValidationError(format!(
                "Quantity of '{}' must be between 1 and {}",
                self.name, MAX_ITEM_QUANTITY
            )));
        }
        Ok(())
    }

    pub fn line_total(&self) -> Result<Decimal, ServiceError> {
        self.check_bounds()?;
        self.unit_price
            .checked_mul(Decimal::from(self.quantity))
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Line total of '{}' is out of range", self.name))
            })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DeliveryAddress {
    #[validate(length(min = 1, message = "Recipient name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address line 1 is required"))]
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Pincode is required"))]
    pub pincode: String,
    #[serde(default)]
    pub full_address: String,
}

impl DeliveryAddress {
    /// Fills `full_address` from the parts when the caller left it blank.
    pub fn normalized(mut self) -> Self {
        if self.full_address.trim().is_empty() {
            let mut parts = vec![self.address_line1.clone()];
            if let Some(line2) = self.address_line2.as_ref().filter(|l| !l.trim().is_empty()) {
                parts.push(line2.clone());
            }
            parts.push(self.city.clone());
            parts.push(format!("{} - {}", self.state, self.pincode));
            self.full_address = parts.join(", ");
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub updated_by: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub delivery_address: DeliveryAddress,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
    pub coupon_code: Option<String>,
    /// `None` only on records that predate tax capture; invoicing backfills it.
    pub gst_amount: Option<Decimal>,
    pub gst_percentage: Decimal,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub status_history: Vec<StatusEntry>,
    pub payment_id: Option<Uuid>,
    pub payment_method: PaymentMethod,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub invoice_number: Option<String>,
    pub has_review: bool,
    pub order_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

impl Order {
    pub fn gst_or_zero(&self) -> Decimal {
        self.gst_amount.unwrap_or(Decimal::ZERO)
    }

    pub fn is_free_delivery(&self) -> bool {
        self.delivery_fee.is_zero()
    }

    pub fn contains_food(&self, food_id: Uuid) -> bool {
        self.items.iter().any(|item| item.food_id == food_id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentFilter {
    Paid,
    Unpaid,
}

/// Admin listing filter. `from` is inclusive and `to` is exclusive.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    pub customer_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub payment: Option<PaymentFilter>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_archived: bool,
}

impl OrderFilter {
    pub fn created_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            include_archived: true,
            ..Default::default()
        }
    }

    /// Every order a customer has placed, archived ones included.
    pub fn for_customer(customer_id: Uuid) -> Self {
        Self {
            customer_id: Some(customer_id),
            include_archived: true,
            ..Default::default()
        }
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    pub fn matches(&self, order: &Order) -> bool {
        if !self.include_archived && order.is_archived {
            return false;
        }
        if self.customer_id.is_some_and(|id| id != order.customer_id) {
            return false;
        }
        if let Some(status) = self.status {
            if order.status != status {
                return false;
            }
        }
        if let Some(from) = self.from {
            if order.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if order.created_at >= to {
                return false;
            }
        }
        match self.payment {
            Some(PaymentFilter::Paid) if !order.is_paid => return false,
            Some(PaymentFilter::Unpaid) if order.is_paid => return false,
            _ => {}
        }
        if let Some(term) = self.search_term() {
            let term = term.to_lowercase();
            let hit = order.customer_name.to_lowercase().contains(&term)
                || order.customer_phone.to_lowercase().contains(&term)
                || order.order_number.to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }
        true
    }
}
