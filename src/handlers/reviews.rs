use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{created_response, ApiResponse, ListResponse};
use crate::{
    common::parse_date_range,
    errors::ServiceError,
    models::{Review, ReviewFilter, ReviewInput, ReviewSort, SortDirection},
    services::reviews::{
        DishRatingReport, FoodRatingInput, FoodRatingOutcome, FoodRatingSummary, ReviewStats,
    },
    AppState,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitReviewRequest {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    #[serde(flatten)]
    pub review: ReviewInput,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitFoodRatingRequest {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    #[serde(flatten)]
    pub rating: FoodRatingInput,
}

/// Query string accepted by the admin review listing
#[derive(Debug, Default, Deserialize)]
pub struct ListReviewsQuery {
    pub rating: Option<u8>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub sort_by: ReviewSort,
    #[serde(default)]
    pub order: SortDirection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewReplyRequest {
    pub response: String,
}

/// Review a delivered order; one review per order
pub async fn submit_review(
    State(state): State<AppState>,
    Json(request): Json<SubmitReviewRequest>,
) -> Result<Response, ServiceError> {
    let review = state
        .services
        .reviews
        .submit_review(request.order_id, request.customer_id, request.review)
        .await?;
    Ok(created_response(review))
}

pub async fn submit_food_rating(
    State(state): State<AppState>,
    Json(request): Json<SubmitFoodRatingRequest>,
) -> Result<Json<ApiResponse<FoodRatingOutcome>>, ServiceError> {
    let outcome = state
        .services
        .reviews
        .submit_food_rating(request.order_id, request.customer_id, request.rating)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn get_order_review(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Review>>, ServiceError> {
    let review = state.services.reviews.get_for_order(order_id).await?;
    Ok(Json(ApiResponse::success(review)))
}

/// Attach the restaurant's reply to a review
pub async fn respond_to_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReviewReplyRequest>,
) -> Result<Json<ApiResponse<Review>>, ServiceError> {
    let review = state.services.reviews.respond(id, &request.response).await?;
    Ok(Json(ApiResponse::success(review)))
}

pub async fn food_rating(
    State(state): State<AppState>,
    Path(food_id): Path<Uuid>,
) -> Result<Json<ApiResponse<FoodRatingSummary>>, ServiceError> {
    let summary = state.services.reviews.food_rating_summary(food_id).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// All reviews for the admin dashboard, newest first unless asked otherwise
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ListReviewsQuery>,
) -> Result<Json<ApiResponse<ListResponse<Review>>>, ServiceError> {
    let (from, to) = parse_date_range(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        state.settings.utc_offset,
    )?;
    let filter = ReviewFilter {
        rating: query.rating,
        from,
        to,
    };
    let reviews = state
        .services
        .reviews
        .list_reviews(&filter, query.sort_by, query.order)
        .await?;
    Ok(Json(ApiResponse::success(ListResponse::from(reviews))))
}

pub async fn dish_ratings(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DishRatingReport>>, ServiceError> {
    let report = state.services.reviews.dish_ratings().await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn review_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ReviewStats>>, ServiceError> {
    let stats = state.services.reviews.review_stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}
