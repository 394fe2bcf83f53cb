#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use fresheats_api::{
    common::{Clock, FixedClock},
    events::EventHub,
    models::{
        DeliveryAddress, Food, Order, OrderItem, OrderStatus, PaymentMethod, PaymentMethodDetails,
    },
    repositories::{FoodRepository, InMemoryStore, Repositories},
    services::{
        checkout::{CheckoutReceipt, CheckoutRequest},
        ServiceFactory, ServiceSettings,
    },
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

/// UTC instant for a wall-clock reading
pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid test timestamp")
}

/// 10:00 IST on 1 March 2025, outside both peak windows
pub fn mid_morning() -> DateTime<Utc> {
    at(2025, 3, 1, 4, 30)
}

pub fn address() -> DeliveryAddress {
    DeliveryAddress {
        name: "Asha Rao".into(),
        phone: "9876543210".into(),
        address_line1: "12 MG Road".into(),
        address_line2: None,
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        pincode: "560001".into(),
        full_address: String::new(),
    }
}

pub fn line(food: &Food, quantity: u32) -> OrderItem {
    OrderItem {
        food_id: food.id,
        name: food.name.clone(),
        quantity,
        unit_price: food.price,
        image: None,
    }
}

pub fn checkout_request(
    customer_id: Uuid,
    items: Vec<OrderItem>,
    method: PaymentMethod,
) -> CheckoutRequest {
    CheckoutRequest {
        customer_id,
        customer_name: "Asha Rao".into(),
        customer_phone: "9876543210".into(),
        customer_email: Some("asha@example.com".into()),
        delivery_address: address(),
        items,
        payment_method: method,
        payment_details: PaymentMethodDetails {
            upi_id: Some("asha@upi".into()),
            ..Default::default()
        },
        coupon_code: None,
        order_notes: None,
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Reads a decimal the API serialized as a string or a number.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        other => other.to_string().parse().expect("decimal number"),
    }
}

/// Application over a fresh in-memory store with a settable clock.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub clock: FixedClock,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(ServiceSettings::default())
    }

    pub fn with_settings(settings: ServiceSettings) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = FixedClock::new(mid_morning());
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let factory = ServiceFactory::new(
            Repositories::from_store(store.clone()),
            settings,
            shared_clock.clone(),
        );
        let state = AppState::new(&factory, shared_clock, None, EventHub::new(16));
        let router = fresheats_api::app(state.clone(), None);
        Self {
            router,
            state,
            store,
            clock,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    pub async fn seed_food(&self, name: &str, price: Decimal) -> Food {
        let food = Food {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price,
            avg_rating: Decimal::ZERO,
            rating_count: 0,
            rating_estimated: false,
        };
        self.store.insert_food(&food).await.expect("seed food");
        food
    }

    pub async fn place_order(
        &self,
        customer_id: Uuid,
        items: Vec<OrderItem>,
        method: PaymentMethod,
    ) -> CheckoutReceipt {
        self.state
            .services
            .checkout
            .place_order(checkout_request(customer_id, items, method))
            .await
            .expect("checkout succeeds")
    }

    /// Walks a confirmed order along the delivery path.
    pub async fn deliver(&self, order_id: Uuid) -> Order {
        let orders = &self.state.services.orders;
        for status in [
            OrderStatus::Preparing,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ] {
            orders
                .advance(order_id, status, Some("kitchen".into()))
                .await
                .expect("forward transition");
        }
        orders.get(order_id).await.expect("order exists")
    }
}
