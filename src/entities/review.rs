use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub food_ratings: Json,
    pub delivery_rating: i16,
    pub overall_rating: i16,
    pub comment: Option<String>,
    pub admin_response: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

fn to_rating(value: i16) -> Result<u8, ServiceError> {
    u8::try_from(value)
        .map_err(|_| ServiceError::InternalError(format!("Stored rating {} is invalid", value)))
}

impl TryFrom<Model> for models::Review {
    type Error = ServiceError;

    fn try_from(row: Model) -> Result<Self, Self::Error> {
        Ok(models::Review {
            id: row.id,
            order_id: row.order_id,
            customer_id: row.customer_id,
            food_ratings: serde_json::from_value(row.food_ratings)?,
            delivery_rating: to_rating(row.delivery_rating)?,
            overall_rating: to_rating(row.overall_rating)?,
            comment: row.comment,
            admin_response: row.admin_response,
            responded_at: row.responded_at,
            created_at: row.created_at,
        })
    }
}

pub fn active_model(review: &models::Review) -> Result<ActiveModel, ServiceError> {
    Ok(ActiveModel {
        id: Set(review.id),
        order_id: Set(review.order_id),
        customer_id: Set(review.customer_id),
        food_ratings: Set(serde_json::to_value(&review.food_ratings)?),
        delivery_rating: Set(i16::from(review.delivery_rating)),
        overall_rating: Set(i16::from(review.overall_rating)),
        comment: Set(review.comment.clone()),
        admin_response: Set(review.admin_response.clone()),
        responded_at: Set(review.responded_at),
        created_at: Set(review.created_at),
    })
}
