use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::instrument;

use crate::{errors::ServiceError, services::checkout::CheckoutRequest, AppState};

/// Place an order from a cart
#[instrument(skip(state, request), fields(customer_id = %request.customer_id))]
pub async fn place_order(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let receipt = state.services.checkout.place_order(request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
