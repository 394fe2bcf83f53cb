use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

use super::common::{ApiResponse, ListResponse};
use crate::{
    errors::ServiceError,
    services::analytics::{
        DashboardSummary, OrderStats, RevenueGranularity, RevenuePoint, TopCustomer, TopFood,
        DEFAULT_LIMIT, DEFAULT_WINDOW_DAYS,
    },
    AppState,
};

/// Build the analytics Router scoped under `/api/v1/analytics`.
pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/revenue", get(revenue))
        .route("/orders", get(order_stats))
        .route("/top-foods", get(top_foods))
        .route("/top-customers", get(top_customers))
}

#[derive(Debug, Default, Deserialize)]
pub struct RevenueQuery {
    #[serde(default)]
    pub period: RevenueGranularity,
    /// Number of local days to look back, today included (default: 30)
    pub days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

pub async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardSummary>>, ServiceError> {
    let summary = state.services.analytics.dashboard().await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Delivered and paid revenue bucketed by day, ISO week or month
pub async fn revenue(
    State(state): State<AppState>,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<ApiResponse<ListResponse<RevenuePoint>>>, ServiceError> {
    let series = state
        .services
        .analytics
        .revenue(query.period, query.days.unwrap_or(DEFAULT_WINDOW_DAYS))
        .await?;
    Ok(Json(ApiResponse::success(ListResponse::from(series))))
}

pub async fn order_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<OrderStats>>, ServiceError> {
    let stats = state.services.analytics.order_stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}

pub async fn top_foods(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<ListResponse<TopFood>>>, ServiceError> {
    let foods = state
        .services
        .analytics
        .top_foods(query.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(ApiResponse::success(ListResponse::from(foods))))
}

pub async fn top_customers(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<ListResponse<TopCustomer>>>, ServiceError> {
    let customers = state
        .services
        .analytics
        .top_customers(query.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(ApiResponse::success(ListResponse::from(customers))))
}
