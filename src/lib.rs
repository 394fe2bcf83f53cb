//! FreshEats API library
//!
//! Order lifecycle, pricing, invoicing and rating engine behind the FreshEats storefront and
//! admin dashboard.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod common;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware;
pub mod migrator;
pub mod models;
pub mod notifications;
pub mod pdf;
pub mod reports;
pub mod repositories;
pub mod services;

use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use std::{sync::Arc, time::Duration};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::common::{Clock, SystemClock};
use crate::events::EventHub;
use crate::repositories::Repositories;
use crate::services::{ServiceContainer, ServiceFactory, ServiceSettings};

/// Upper bound for a single HTTP request, PDF rendering included
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub services: ServiceContainer,
    pub settings: ServiceSettings,
    pub clock: Arc<dyn Clock>,
    /// None when running on the in-memory store
    pub db: Option<Arc<DatabaseConnection>>,
    pub event_hub: EventHub,
}

impl AppState {
    pub fn new(
        factory: &ServiceFactory,
        clock: Arc<dyn Clock>,
        db: Option<Arc<DatabaseConnection>>,
        event_hub: EventHub,
    ) -> Self {
        Self {
            services: factory.build(),
            settings: factory.settings().clone(),
            clock,
            db,
            event_hub,
        }
    }

    /// Self-contained state over a fresh in-memory store, without events or notifications.
    pub fn in_memory(settings: ServiceSettings) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let factory = ServiceFactory::new(Repositories::in_memory(), settings, clock.clone());
        Self::new(&factory, clock, None, EventHub::new(16))
    }
}

pub fn api_v1_routes() -> Router<AppState> {
    let orders = Router::new()
        .route("/checkout", post(handlers::checkout::place_order))
        .route("/orders", get(handlers::orders::list_orders))
        .route(
            "/orders/:id",
            get(handlers::orders::get_order).delete(handlers::orders::delete_order),
        )
        .route(
            "/orders/customer/:customer_id",
            get(handlers::orders::customer_orders),
        )
        .route(
            "/orders/by-number/:order_number",
            get(handlers::orders::get_order_by_number),
        )
        .route("/orders/:id/status", put(handlers::orders::update_order_status))
        .route("/orders/:id/archive", post(handlers::orders::archive_order))
        .route("/orders/:id/unarchive", post(handlers::orders::unarchive_order));

    let billing = Router::new()
        .route("/orders/:id/payment", get(handlers::orders::get_order_payment))
        .route("/orders/:id/payment/retry", post(handlers::payments::retry_payment))
        .route("/orders/:id/settle", post(handlers::payments::settle_order))
        .route(
            "/payments/customer/:customer_id",
            get(handlers::payments::customer_payments),
        )
        .route("/orders/:id/refund", post(handlers::payments::refund_order))
        .route("/orders/:id/invoice", get(handlers::invoices::download_invoice))
        .route("/reports/monthly", get(handlers::invoices::monthly_report));

    let pricing = Router::new()
        .route(
            "/coupons",
            get(handlers::coupons::list_coupons).post(handlers::coupons::create_coupon),
        )
        .route("/coupons/validate", post(handlers::coupons::validate_coupon))
        .route(
            "/coupons/:id",
            get(handlers::coupons::get_coupon)
                .put(handlers::coupons::update_coupon)
                .delete(handlers::coupons::delete_coupon),
        )
        .route("/delivery/quote", post(handlers::delivery::quote_delivery))
        .route("/delivery/config", get(handlers::delivery::delivery_config));

    let reviews = Router::new()
        .route("/reviews", post(handlers::reviews::submit_review))
        .route("/reviews/food-rating", post(handlers::reviews::submit_food_rating))
        .route("/reviews/order/:order_id", get(handlers::reviews::get_order_review))
        .route("/reviews/admin/all", get(handlers::reviews::list_reviews))
        .route("/reviews/admin/dish-ratings", get(handlers::reviews::dish_ratings))
        .route("/reviews/admin/stats", get(handlers::reviews::review_stats))
        .route("/reviews/:id/response", post(handlers::reviews::respond_to_review))
        .route("/foods/:id/rating", get(handlers::reviews::food_rating));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(orders)
        .merge(billing)
        .merge(pricing)
        .merge(reviews)
        .nest("/analytics", handlers::analytics::analytics_routes())
}

/// CORS from a comma-separated origin list; permissive when none is configured.
pub fn cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect()
        })
        .unwrap_or_default();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Full application router with the HTTP middleware stack applied.
pub fn app(state: AppState, allowed_origins: Option<&str>) -> Router {
    Router::new()
        .route("/", get(|| async { "fresheats-api up" }))
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors_layer(allowed_origins))
        .layer(axum::middleware::from_fn(
            middleware::request_id::request_id_middleware,
        ))
}
