use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{self, PaymentMethod, PaymentStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub gateway_reference: String,
    pub method_details: Json,
    pub refund: Option<Json>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for models::Payment {
    type Error = ServiceError;

    fn try_from(row: Model) -> Result<Self, Self::Error> {
        let refund = match row.refund {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };
        Ok(models::Payment {
            id: row.id,
            order_id: row.order_id,
            customer_id: row.customer_id,
            amount: row.amount,
            currency: row.currency,
            method: row.method,
            status: row.status,
            gateway_reference: row.gateway_reference,
            method_details: serde_json::from_value(row.method_details)?,
            refund,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub fn active_model(payment: &models::Payment) -> Result<ActiveModel, ServiceError> {
    let refund = match &payment.refund {
        Some(record) => Some(serde_json::to_value(record)?),
        None => None,
    };
    Ok(ActiveModel {
        id: Set(payment.id),
        order_id: Set(payment.order_id),
        customer_id: Set(payment.customer_id),
        amount: Set(payment.amount),
        currency: Set(payment.currency.clone()),
        method: Set(payment.method),
        status: Set(payment.status),
        gateway_reference: Set(payment.gateway_reference.clone()),
        method_details: Set(serde_json::to_value(&payment.method_details)?),
        refund: Set(refund),
        created_at: Set(payment.created_at),
        updated_at: Set(payment.updated_at),
    })
}
