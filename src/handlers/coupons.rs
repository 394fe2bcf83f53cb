use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{created_response, no_content_response, ApiResponse, ListResponse};
use crate::{
    errors::ServiceError,
    models::{Coupon, CouponDraft},
    AppState,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub order_value: Decimal,
}

pub async fn list_coupons(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ListResponse<Coupon>>>, ServiceError> {
    let coupons = state.services.coupons.list().await?;
    Ok(Json(ApiResponse::success(ListResponse::from(coupons))))
}

pub async fn create_coupon(
    State(state): State<AppState>,
    Json(draft): Json<CouponDraft>,
) -> Result<Response, ServiceError> {
    let coupon = state.services.coupons.create(draft).await?;
    Ok(created_response(coupon))
}

pub async fn get_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Coupon>>, ServiceError> {
    let coupon = state.services.coupons.get(id).await?;
    Ok(Json(ApiResponse::success(coupon)))
}

pub async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<CouponDraft>,
) -> Result<Json<ApiResponse<Coupon>>, ServiceError> {
    let coupon = state.services.coupons.update(id, draft).await?;
    Ok(Json(ApiResponse::success(coupon)))
}

pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.coupons.delete(id).await?;
    Ok(no_content_response())
}

/// Check a code against a cart value. Ineligible codes answer 400 with the reason and the coupon.
pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(request): Json<ValidateCouponRequest>,
) -> Result<Response, ServiceError> {
    if request.order_value < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Order value cannot be negative".to_string(),
        ));
    }
    let check = state
        .services
        .coupons
        .validate_code(&request.code, request.order_value)
        .await?;
    if check.valid {
        let message = check.message.clone();
        Ok((StatusCode::OK, Json(ApiResponse::success(check).with_message(message))).into_response())
    } else {
        let message = check.message.clone();
        Ok((StatusCode::BAD_REQUEST, Json(ApiResponse::rejected(check, message))).into_response())
    }
}
