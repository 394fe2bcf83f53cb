use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{self, DiscountType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_order_value: Decimal,
    pub max_discount: Option<Decimal>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

fn to_count(value: i32, column: &str) -> Result<u32, ServiceError> {
    u32::try_from(value).map_err(|_| {
        ServiceError::InternalError(format!("Negative {} stored on coupon", column))
    })
}

fn to_column(value: u32) -> Result<i32, ServiceError> {
    i32::try_from(value)
        .map_err(|_| ServiceError::ValidationError("Coupon usage is out of range".to_string()))
}

impl TryFrom<Model> for models::Coupon {
    type Error = ServiceError;

    fn try_from(row: Model) -> Result<Self, Self::Error> {
        let usage_limit = match row.usage_limit {
            Some(limit) => Some(to_count(limit, "usage_limit")?),
            None => None,
        };
        Ok(models::Coupon {
            id: row.id,
            code: row.code,
            description: row.description,
            discount_type: row.discount_type,
            discount_value: row.discount_value,
            min_order_value: row.min_order_value,
            max_discount: row.max_discount,
            valid_from: row.valid_from,
            valid_to: row.valid_to,
            usage_limit,
            used_count: to_count(row.used_count, "used_count")?,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub fn active_model(coupon: &models::Coupon) -> Result<ActiveModel, ServiceError> {
    let usage_limit = match coupon.usage_limit {
        Some(limit) => Some(to_column(limit)?),
        None => None,
    };
    Ok(ActiveModel {
        id: Set(coupon.id),
        code: Set(coupon.code.clone()),
        description: Set(coupon.description.clone()),
        discount_type: Set(coupon.discount_type),
        discount_value: Set(coupon.discount_value),
        min_order_value: Set(coupon.min_order_value),
        max_discount: Set(coupon.max_discount),
        valid_from: Set(coupon.valid_from),
        valid_to: Set(coupon.valid_to),
        usage_limit: Set(usage_limit),
        used_count: Set(to_column(coupon.used_count)?),
        is_active: Set(coupon.is_active),
        created_at: Set(coupon.created_at),
        updated_at: Set(coupon.updated_at),
    })
}
