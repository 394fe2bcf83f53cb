use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::ApiResponse;
use crate::{
    errors::ServiceError,
    services::delivery::{DeliveryPolicy, DeliveryQuote},
    AppState,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct DeliveryQuoteRequest {
    pub order_value: Decimal,
}

/// Delivery charge for a cart placed now
pub async fn quote_delivery(
    State(state): State<AppState>,
    Json(request): Json<DeliveryQuoteRequest>,
) -> Result<Json<ApiResponse<DeliveryQuote>>, ServiceError> {
    let quote = state.services.delivery.quote_now(request.order_value)?;
    Ok(Json(ApiResponse::success(quote)))
}

pub async fn delivery_config(State(state): State<AppState>) -> Json<ApiResponse<DeliveryPolicy>> {
    Json(ApiResponse::success(state.services.delivery.config()))
}
