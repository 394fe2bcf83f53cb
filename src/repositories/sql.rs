use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use super::{
    CouponRepository, FoodRepository, OrderRepository, PaymentRepository, ReviewRepository,
    SequenceStore,
};
use crate::entities::{coupon, food, order, payment, review, sequence_counter};
use crate::errors::ServiceError;
use crate::models::{
    Coupon, Food, Order, OrderFilter, OrderStatus, Payment, PaymentFilter, RatingSnapshot, Review,
    ReviewFilter,
};
use crate::services::sequence::SequenceKind;

/// sea-orm backed store. Uniqueness of order numbers, invoice numbers, coupon codes and
/// one-review-per-order comes from the unique indexes created by the migrator.
#[derive(Clone)]
pub struct SqlStore {
    db: Arc<DatabaseConnection>,
}

impl SqlStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn db_error(operation: &str, err: DbErr) -> ServiceError {
    error!(operation = %operation, error = %err, "Database operation failed");
    ServiceError::DatabaseError(err)
}

fn rows<M, T>(models: Vec<M>) -> Result<Vec<T>, ServiceError>
where
    T: TryFrom<M, Error = ServiceError>,
{
    models.into_iter().map(T::try_from).collect()
}

fn row<M, T>(model: Option<M>) -> Result<Option<T>, ServiceError>
where
    T: TryFrom<M, Error = ServiceError>,
{
    model.map(T::try_from).transpose()
}

#[async_trait]
impl OrderRepository for SqlStore {
    async fn insert_order(&self, order: &Order) -> Result<(), ServiceError> {
        let model = order::active_model(order)?;
        match order::Entity::insert(model)
            .exec_without_returning(&*self.db)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                debug!(order_number = %order.order_number, "Order number already taken");
                Err(ServiceError::SequenceCollision(order.order_number.clone()))
            }
            Err(e) => Err(db_error("insert_order", e)),
        }
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, ServiceError> {
        let model = order::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(|e| db_error("find_order", e))?;
        row(model)
    }

    async fn find_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Order>, ServiceError> {
        let model = order::Entity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await
            .map_err(|e| db_error("find_order_by_number", e))?;
        row(model)
    }

    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError> {
        let mut query = order::Entity::find();

        if !filter.include_archived {
            query = query.filter(order::Column::IsArchived.eq(false));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(order::Column::CustomerId.eq(customer_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(from) = filter.from {
            query = query.filter(order::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(order::Column::CreatedAt.lt(to));
        }
        match filter.payment {
            Some(PaymentFilter::Paid) => query = query.filter(order::Column::IsPaid.eq(true)),
            Some(PaymentFilter::Unpaid) => query = query.filter(order::Column::IsPaid.eq(false)),
            None => {}
        }
        if let Some(term) = filter.search_term() {
            let pattern = format!("%{}%", term.to_lowercase());
            let lower = |column: order::Column| {
                Expr::expr(Func::lower(Expr::col((order::Entity, column)))).like(pattern.clone())
            };
            query = query.filter(
                Condition::any()
                    .add(lower(order::Column::CustomerName))
                    .add(lower(order::Column::CustomerPhone))
                    .add(lower(order::Column::OrderNumber)),
            );
        }

        let models = query
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(|e| db_error("find_orders", e))?;
        rows(models)
    }

    async fn save_order(&self, order: &Order) -> Result<Order, ServiceError> {
        let mut next = order.clone();
        next.version += 1;
        let mut model = order::active_model(&next)?;
        // Order numbers are immutable once issued
        model.order_number = sea_orm::ActiveValue::NotSet;

        let result = order::Entity::update_many()
            .set(model)
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::Version.eq(order.version))
            .exec(&*self.db)
            .await;

        match result {
            Ok(res) if res.rows_affected == 1 => Ok(next),
            Ok(_) => {
                let exists = order::Entity::find_by_id(order.id)
                    .count(&*self.db)
                    .await
                    .map_err(|e| db_error("save_order", e))?;
                if exists == 0 {
                    Err(ServiceError::NotFound(format!("Order {} not found", order.id)))
                } else {
                    Err(ServiceError::ConcurrentModification(order.id))
                }
            }
            Err(e) if is_unique_violation(&e) => Err(ServiceError::SequenceCollision(
                order.invoice_number.clone().unwrap_or_default(),
            )),
            Err(e) => Err(db_error("save_order", e)),
        }
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool, ServiceError> {
        let res = order::Entity::delete_by_id(id)
            .exec(&*self.db)
            .await
            .map_err(|e| db_error("delete_order", e))?;
        Ok(res.rows_affected > 0)
    }

    async fn find_stale_pending_orders(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, ServiceError> {
        let models = order::Entity::find()
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .filter(order::Column::CreatedAt.lte(created_before))
            .order_by_asc(order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(|e| db_error("find_stale_pending_orders", e))?;
        rows(models)
    }
}

#[async_trait]
impl PaymentRepository for SqlStore {
    async fn insert_payment(&self, payment: &Payment) -> Result<(), ServiceError> {
        let model = payment::active_model(payment)?;
        match payment::Entity::insert(model)
            .exec_without_returning(&*self.db)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(ServiceError::Conflict(format!(
                "Payment {} already exists",
                payment.id
            ))),
            Err(e) => Err(db_error("insert_payment", e)),
        }
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, ServiceError> {
        let model = payment::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(|e| db_error("find_payment", e))?;
        row(model)
    }

    async fn find_payment_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Payment>, ServiceError> {
        let model = payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .order_by_desc(payment::Column::CreatedAt)
            .one(&*self.db)
            .await
            .map_err(|e| db_error("find_payment_for_order", e))?;
        row(model)
    }

    async fn find_payments_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<Payment>, ServiceError> {
        let models = payment::Entity::find()
            .filter(payment::Column::CustomerId.eq(customer_id))
            .order_by_desc(payment::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(|e| db_error("find_payments_for_customer", e))?;
        rows(models)
    }

    async fn save_payment(&self, payment: &Payment) -> Result<(), ServiceError> {
        let model = payment::active_model(payment)?;
        let res = payment::Entity::update_many()
            .set(model)
            .filter(payment::Column::Id.eq(payment.id))
            .exec(&*self.db)
            .await
            .map_err(|e| db_error("save_payment", e))?;
        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Payment {} not found",
                payment.id
            )));
        }
        Ok(())
    }

    async fn delete_payments_for_order(&self, order_id: Uuid) -> Result<u64, ServiceError> {
        let res = payment::Entity::delete_many()
            .filter(payment::Column::OrderId.eq(order_id))
            .exec(&*self.db)
            .await
            .map_err(|e| db_error("delete_payments_for_order", e))?;
        Ok(res.rows_affected)
    }
}

#[async_trait]
impl CouponRepository for SqlStore {
    async fn insert_coupon(&self, coupon: &Coupon) -> Result<(), ServiceError> {
        let model = coupon::active_model(coupon)?;
        match coupon::Entity::insert(model)
            .exec_without_returning(&*self.db)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(ServiceError::Conflict(format!(
                "Coupon code {} already exists",
                coupon.code
            ))),
            Err(e) => Err(db_error("insert_coupon", e)),
        }
    }

    async fn find_coupon(&self, id: Uuid) -> Result<Option<Coupon>, ServiceError> {
        let model = coupon::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(|e| db_error("find_coupon", e))?;
        row(model)
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, ServiceError> {
        let model = coupon::Entity::find()
            .filter(coupon::Column::Code.eq(code))
            .one(&*self.db)
            .await
            .map_err(|e| db_error("find_coupon_by_code", e))?;
        row(model)
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>, ServiceError> {
        let models = coupon::Entity::find()
            .order_by_desc(coupon::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(|e| db_error("list_coupons", e))?;
        rows(models)
    }

    async fn save_coupon(&self, coupon: &Coupon) -> Result<(), ServiceError> {
        let mut model = coupon::active_model(coupon)?;
        // Usage is only ever moved by the conditional claim
        model.used_count = sea_orm::ActiveValue::NotSet;

        let result = coupon::Entity::update_many()
            .set(model)
            .filter(coupon::Column::Id.eq(coupon.id))
            .exec(&*self.db)
            .await;
        match result {
            Ok(res) if res.rows_affected == 0 => Err(ServiceError::NotFound(format!(
                "Coupon {} not found",
                coupon.id
            ))),
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(ServiceError::Conflict(format!(
                "Coupon code {} already exists",
                coupon.code
            ))),
            Err(e) => Err(db_error("save_coupon", e)),
        }
    }

    async fn delete_coupon(&self, id: Uuid) -> Result<bool, ServiceError> {
        let res = coupon::Entity::delete_by_id(id)
            .exec(&*self.db)
            .await
            .map_err(|e| db_error("delete_coupon", e))?;
        Ok(res.rows_affected > 0)
    }

    async fn claim_coupon_usage(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, ServiceError> {
        let res = coupon::Entity::update_many()
            .col_expr(
                coupon::Column::UsedCount,
                Expr::col(coupon::Column::UsedCount).add(1),
            )
            .col_expr(coupon::Column::UpdatedAt, Expr::value(at))
            .filter(coupon::Column::Id.eq(id))
            .filter(
                Condition::any()
                    .add(coupon::Column::UsageLimit.is_null())
                    .add(
                        Expr::col(coupon::Column::UsedCount)
                            .lt(Expr::col(coupon::Column::UsageLimit)),
                    ),
            )
            .exec(&*self.db)
            .await
            .map_err(|e| db_error("claim_coupon_usage", e))?;
        Ok(res.rows_affected == 1)
    }
}

#[async_trait]
impl ReviewRepository for SqlStore {
    async fn insert_review(&self, review: &Review) -> Result<(), ServiceError> {
        let model = review::active_model(review)?;
        match review::Entity::insert(model)
            .exec_without_returning(&*self.db)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(ServiceError::Conflict(format!(
                "Order {} has already been reviewed",
                review.order_id
            ))),
            Err(e) => Err(db_error("insert_review", e)),
        }
    }

    async fn find_review(&self, id: Uuid) -> Result<Option<Review>, ServiceError> {
        let model = review::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(|e| db_error("find_review", e))?;
        row(model)
    }

    async fn find_review_for_order(&self, order_id: Uuid) -> Result<Option<Review>, ServiceError> {
        let model = review::Entity::find()
            .filter(review::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await
            .map_err(|e| db_error("find_review_for_order", e))?;
        row(model)
    }

    async fn find_reviews(&self, filter: &ReviewFilter) -> Result<Vec<Review>, ServiceError> {
        let mut query = review::Entity::find();
        if let Some(rating) = filter.rating {
            query = query.filter(review::Column::OverallRating.eq(i16::from(rating)));
        }
        if let Some(from) = filter.from {
            query = query.filter(review::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(review::Column::CreatedAt.lt(to));
        }
        let models = query
            .order_by_desc(review::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(|e| db_error("find_reviews", e))?;
        rows(models)
    }

    async fn save_review(&self, review: &Review) -> Result<(), ServiceError> {
        let model = review::active_model(review)?;
        let res = review::Entity::update_many()
            .set(model)
            .filter(review::Column::Id.eq(review.id))
            .exec(&*self.db)
            .await
            .map_err(|e| db_error("save_review", e))?;
        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Review {} not found",
                review.id
            )));
        }
        Ok(())
    }

    async fn ratings_for_food(&self, food_id: Uuid) -> Result<Vec<u8>, ServiceError> {
        let models = review::Entity::find()
            .all(&*self.db)
            .await
            .map_err(|e| db_error("ratings_for_food", e))?;
        let reviews: Vec<Review> = rows(models)?;
        Ok(reviews
            .iter()
            .flat_map(|r| r.food_ratings.iter())
            .filter(|entry| entry.food_id == food_id)
            .map(|entry| entry.rating)
            .collect())
    }
}

#[async_trait]
impl FoodRepository for SqlStore {
    async fn insert_food(&self, food: &Food) -> Result<(), ServiceError> {
        let model = food::active_model(food)?;
        food::Entity::insert(model)
            .exec_without_returning(&*self.db)
            .await
            .map_err(|e| db_error("insert_food", e))?;
        Ok(())
    }

    async fn find_food(&self, id: Uuid) -> Result<Option<Food>, ServiceError> {
        let model = food::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(|e| db_error("find_food", e))?;
        row(model)
    }

    async fn save_food_rating(
        &self,
        id: Uuid,
        snapshot: RatingSnapshot,
        estimated: bool,
    ) -> Result<(), ServiceError> {
        let model = food::ActiveModel {
            id: Set(id),
            avg_rating: Set(snapshot.avg_rating),
            rating_count: Set(food::rating_count_column(snapshot.rating_count)?),
            rating_estimated: Set(estimated),
            ..Default::default()
        };
        match model.update(&*self.db).await {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => {
                Err(ServiceError::NotFound(format!("Food {} not found", id)))
            }
            Err(e) => Err(db_error("save_food_rating", e)),
        }
    }

    async fn foods_with_estimated_rating(&self) -> Result<Vec<Uuid>, ServiceError> {
        food::Entity::find()
            .select_only()
            .column(food::Column::Id)
            .filter(food::Column::RatingEstimated.eq(true))
            .into_tuple::<Uuid>()
            .all(&*self.db)
            .await
            .map_err(|e| db_error("foods_with_estimated_rating", e))
    }
}

#[async_trait]
impl SequenceStore for SqlStore {
    async fn greatest_with_prefix(
        &self,
        kind: SequenceKind,
        prefix: &str,
    ) -> Result<Option<String>, ServiceError> {
        let found = match kind {
            SequenceKind::Order => order::Entity::find()
                .select_only()
                .column(order::Column::OrderNumber)
                .filter(order::Column::OrderNumber.starts_with(prefix))
                .order_by_desc(order::Column::OrderNumber)
                .into_tuple::<String>()
                .one(&*self.db)
                .await,
            SequenceKind::Invoice => order::Entity::find()
                .select_only()
                .column(order::Column::InvoiceNumber)
                .filter(order::Column::InvoiceNumber.starts_with(prefix))
                .order_by_desc(order::Column::InvoiceNumber)
                .into_tuple::<Option<String>>()
                .one(&*self.db)
                .await
                .map(Option::flatten),
        };
        found.map_err(|e| db_error("greatest_with_prefix", e))
    }

    async fn increment_counter(&self, prefix: &str) -> Result<Option<i64>, ServiceError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| db_error("increment_counter", e))?;

        let res = sequence_counter::Entity::update_many()
            .col_expr(
                sequence_counter::Column::LastValue,
                Expr::col(sequence_counter::Column::LastValue).add(1),
            )
            .col_expr(sequence_counter::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sequence_counter::Column::Prefix.eq(prefix))
            .exec(&txn)
            .await
            .map_err(|e| db_error("increment_counter", e))?;

        if res.rows_affected == 0 {
            txn.rollback()
                .await
                .map_err(|e| db_error("increment_counter", e))?;
            return Ok(None);
        }

        let counter = sequence_counter::Entity::find_by_id(prefix.to_string())
            .one(&txn)
            .await
            .map_err(|e| db_error("increment_counter", e))?;
        txn.commit()
            .await
            .map_err(|e| db_error("increment_counter", e))?;
        Ok(counter.map(|c| c.last_value))
    }

    async fn create_counter(&self, prefix: &str, value: i64) -> Result<(), ServiceError> {
        let model = sequence_counter::ActiveModel {
            prefix: Set(prefix.to_string()),
            last_value: Set(value),
            updated_at: Set(Utc::now()),
        };
        match sequence_counter::Entity::insert(model)
            .exec_without_returning(&*self.db)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(ServiceError::SequenceCollision(prefix.to_string()))
            }
            Err(e) => Err(db_error("create_counter", e)),
        }
    }
}
