use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use super::common::{ApiResponse, ListResponse};
use crate::{
    errors::ServiceError,
    models::{Order, Payment},
    services::payments::RefundRequest,
    AppState,
};

#[derive(Debug, Serialize)]
pub struct PaymentOutcome {
    pub order: Order,
    pub payment: Payment,
}

/// Re-run payment capture for an order whose checkout stopped short
pub async fn retry_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentOutcome>>, ServiceError> {
    let (order, payment) = state.services.payments.retry_payment(id).await?;
    Ok(Json(
        ApiResponse::success(PaymentOutcome { order, payment }).with_message("Payment recorded"),
    ))
}

/// A customer's payments, newest first
pub async fn customer_payments(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ListResponse<Payment>>>, ServiceError> {
    let payments = state
        .services
        .payments
        .history_for_customer(customer_id)
        .await?;
    Ok(Json(ApiResponse::success(ListResponse::from(payments))))
}

/// Mark cash collected for a cash-on-delivery order
pub async fn settle_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    let order = state.services.payments.settle_cash_on_delivery(id).await?;
    Ok(Json(ApiResponse::success(order).with_message("Payment settled")))
}

pub async fn refund_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<RefundRequest>>,
) -> Result<Json<ApiResponse<Payment>>, ServiceError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let payment = state.services.payments.refund(id, request).await?;
    Ok(Json(ApiResponse::success(payment).with_message("Refund processed")))
}
