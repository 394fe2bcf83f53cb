use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "foods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub avg_rating: Decimal,
    pub rating_count: i32,
    pub rating_estimated: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for models::Food {
    type Error = ServiceError;

    fn try_from(row: Model) -> Result<Self, Self::Error> {
        Ok(models::Food {
            id: row.id,
            name: row.name,
            price: row.price,
            avg_rating: row.avg_rating,
            rating_count: u32::try_from(row.rating_count).map_err(|_| {
                ServiceError::InternalError(format!("Food {} has a negative rating count", row.id))
            })?,
            rating_estimated: row.rating_estimated,
        })
    }
}

pub fn active_model(food: &models::Food) -> Result<ActiveModel, ServiceError> {
    Ok(ActiveModel {
        id: Set(food.id),
        name: Set(food.name.clone()),
        price: Set(food.price),
        avg_rating: Set(food.avg_rating),
        rating_count: Set(rating_count_column(food.rating_count)?),
        rating_estimated: Set(food.rating_estimated),
    })
}

pub fn rating_count_column(count: u32) -> Result<i32, ServiceError> {
    i32::try_from(count)
        .map_err(|_| ServiceError::InternalError("Rating count out of range".to_string()))
}
