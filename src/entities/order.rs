use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{self, OrderStatus, PaymentMethod};

/// One row per order. Line items, history and address are embedded as JSON documents.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub delivery_address: Json,
    pub items: Json,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
    pub coupon_code: Option<String>,
    pub gst_amount: Option<Decimal>,
    pub gst_percentage: Decimal,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub status_history: Json,
    pub payment_id: Option<Uuid>,
    pub payment_method: PaymentMethod,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    #[sea_orm(unique)]
    pub invoice_number: Option<String>,
    pub has_review: bool,
    pub order_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for models::Order {
    type Error = ServiceError;

    fn try_from(row: Model) -> Result<Self, Self::Error> {
        Ok(models::Order {
            id: row.id,
            order_number: row.order_number,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            customer_email: row.customer_email,
            delivery_address: serde_json::from_value(row.delivery_address)?,
            items: serde_json::from_value(row.items)?,
            subtotal: row.subtotal,
            delivery_fee: row.delivery_fee,
            discount: row.discount,
            coupon_code: row.coupon_code,
            gst_amount: row.gst_amount,
            gst_percentage: row.gst_percentage,
            total_amount: row.total_amount,
            status: row.status,
            status_history: serde_json::from_value(row.status_history)?,
            payment_id: row.payment_id,
            payment_method: row.payment_method,
            is_paid: row.is_paid,
            paid_at: row.paid_at,
            is_delivered: row.is_delivered,
            delivered_at: row.delivered_at,
            cancelled_at: row.cancelled_at,
            is_archived: row.is_archived,
            archived_at: row.archived_at,
            invoice_number: row.invoice_number,
            has_review: row.has_review,
            order_notes: row.order_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

/// Every column set from the domain document.
pub fn active_model(order: &models::Order) -> Result<ActiveModel, ServiceError> {
    Ok(ActiveModel {
        id: Set(order.id),
        order_number: Set(order.order_number.clone()),
        customer_id: Set(order.customer_id),
        customer_name: Set(order.customer_name.clone()),
        customer_phone: Set(order.customer_phone.clone()),
        customer_email: Set(order.customer_email.clone()),
        delivery_address: Set(serde_json::to_value(&order.delivery_address)?),
        items: Set(serde_json::to_value(&order.items)?),
        subtotal: Set(order.subtotal),
        delivery_fee: Set(order.delivery_fee),
        discount: Set(order.discount),
        coupon_code: Set(order.coupon_code.clone()),
        gst_amount: Set(order.gst_amount),
        gst_percentage: Set(order.gst_percentage),
        total_amount: Set(order.total_amount),
        status: Set(order.status),
        status_history: Set(serde_json::to_value(&order.status_history)?),
        payment_id: Set(order.payment_id),
        payment_method: Set(order.payment_method),
        is_paid: Set(order.is_paid),
        paid_at: Set(order.paid_at),
        is_delivered: Set(order.is_delivered),
        delivered_at: Set(order.delivered_at),
        cancelled_at: Set(order.cancelled_at),
        is_archived: Set(order.is_archived),
        archived_at: Set(order.archived_at),
        invoice_number: Set(order.invoice_number.clone()),
        has_review: Set(order.has_review),
        order_notes: Set(order.order_notes.clone()),
        created_at: Set(order.created_at),
        updated_at: Set(order.updated_at),
        version: Set(order.version),
    })
}
