use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::common::{no_content_response, success_response, ApiResponse, ListResponse};
use crate::{
    common::parse_date_range,
    errors::ServiceError,
    models::{Order, OrderFilter, OrderStatus, PaymentFilter},
    AppState,
};

/// Query string accepted by the admin order listing
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub customer_id: Option<Uuid>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub payment: Option<PaymentFilter>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_archived: bool,
}

impl ListOrdersQuery {
    fn into_filter(self, state: &AppState) -> Result<OrderFilter, ServiceError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(OrderStatus::parse(raw)?),
        };
        let (from, to) = parse_date_range(
            self.start_date.as_deref(),
            self.end_date.as_deref(),
            state.settings.utc_offset,
        )?;
        Ok(OrderFilter {
            customer_id: self.customer_id,
            status,
            from,
            to,
            payment: self.payment,
            search: self.search,
            include_archived: self.include_archived,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
    #[serde(default)]
    pub updated_by: Option<String>,
}

/// List orders, newest first
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ApiResponse<ListResponse<Order>>>, ServiceError> {
    let filter = query.into_filter(&state)?;
    let orders = state.services.orders.list(&filter).await?;
    Ok(Json(ApiResponse::success(ListResponse::from(orders))))
}

/// Every order a customer has placed, newest first
pub async fn customer_orders(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ListResponse<Order>>>, ServiceError> {
    let orders = state.services.orders.history_for_customer(customer_id).await?;
    Ok(Json(ApiResponse::success(ListResponse::from(orders))))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    let order = state.services.orders.get(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

pub async fn get_order_by_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    let order = state.services.orders.get_by_number(&order_number).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Move an order to a new status
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    payload.validate()?;
    let status = OrderStatus::parse(&payload.status)?;
    let actor = payload
        .updated_by
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let order = state.services.orders.advance(id, status, actor).await?;
    Ok(Json(
        ApiResponse::success(order).with_message(format!("Order status updated to {}", status)),
    ))
}

pub async fn archive_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    let order = state.services.orders.archive(id).await?;
    Ok(Json(ApiResponse::success(order).with_message("Order archived")))
}

pub async fn unarchive_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    let order = state.services.orders.unarchive(id).await?;
    Ok(Json(ApiResponse::success(order).with_message("Order restored")))
}

/// Permanently delete an order
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.orders.hard_delete(id).await?;
    Ok(no_content_response())
}

/// Current payment record for an order
pub async fn get_order_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let payment = state.services.payments.payment_for_order(id).await?;
    Ok(success_response(payment))
}
