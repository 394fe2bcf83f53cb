//! Invoices, payments and monthly billing reports.

mod common;

use assert_matches::assert_matches;
use axum::http::{header, Method, StatusCode};
use common::{at, decimal, line, response_json, TestApp};
use fresheats_api::{
    errors::ServiceError,
    models::{OrderStatus, PaymentMethod, PaymentStatus},
    services::payments::RefundRequest,
};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn invoice_download_assigns_number_once() {
    let app = TestApp::new();
    let biryani = app.seed_food("Veg Biryani", dec!(120)).await;
    let receipt = app
        .place_order(Uuid::new_v4(), vec![line(&biryani, 2)], PaymentMethod::Upi)
        .await;
    let uri = format!("/api/v1/orders/{}/invoice", receipt.order.id);

    let response = app.request(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=Invoice-INV-2025-000001.pdf"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.starts_with(b"%PDF-1.4"));

    // A second download reuses the number
    let again = app.request(Method::GET, &uri, None).await;
    assert_eq!(
        again.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=Invoice-INV-2025-000001.pdf"
    );

    let order = app.state.services.orders.get(receipt.order.id).await.unwrap();
    assert_eq!(order.invoice_number.as_deref(), Some("INV-2025-000001"));
    assert_eq!(order.gst_amount, Some(dec!(12.00)));
}

#[tokio::test]
async fn invoices_are_numbered_in_request_order() {
    let app = TestApp::new();
    let dosa = app.seed_food("Masala Dosa", dec!(90)).await;
    let first = app
        .place_order(Uuid::new_v4(), vec![line(&dosa, 1)], PaymentMethod::Cod)
        .await;
    let second = app
        .place_order(Uuid::new_v4(), vec![line(&dosa, 2)], PaymentMethod::Cod)
        .await;
    let invoicing = &app.state.services.invoicing;

    // The later order asks first and gets the first invoice number
    let b = invoicing.ensure_invoice_number(second.order.id).await.unwrap();
    let a = invoicing.ensure_invoice_number(first.order.id).await.unwrap();
    assert_eq!(b.invoice_number.as_deref(), Some("INV-2025-000001"));
    assert_eq!(a.invoice_number.as_deref(), Some("INV-2025-000002"));
}

#[tokio::test]
async fn unknown_order_invoice_is_404() {
    let app = TestApp::new();
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}/invoice", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn cash_on_delivery_is_settled_then_not_refundable_online() {
    let app = TestApp::new();
    let thali = app.seed_food("Thali", dec!(180)).await;
    let receipt = app
        .place_order(Uuid::new_v4(), vec![line(&thali, 1)], PaymentMethod::Cod)
        .await;
    let payments = &app.state.services.payments;

    let settled = payments.settle_cash_on_delivery(receipt.order.id).await.unwrap();
    assert!(settled.is_paid);
    assert!(settled.paid_at.is_some());
    let payment = payments.payment_for_order(receipt.order.id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Success);

    assert_matches!(
        payments.refund(receipt.order.id, RefundRequest::default()).await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test]
async fn online_payment_refund_over_http() {
    let app = TestApp::new();
    let paneer = app.seed_food("Paneer Tikka", dec!(200)).await;
    let receipt = app
        .place_order(Uuid::new_v4(), vec![line(&paneer, 1)], PaymentMethod::Card)
        .await;
    let uri = format!("/api/v1/orders/{}/refund", receipt.order.id);

    let too_much = app
        .request(
            Method::POST,
            &uri,
            Some(serde_json::json!({ "amount": "10000" })),
        )
        .await;
    assert_eq!(too_much.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(Method::POST, &uri, Some(serde_json::json!({ "amount": "50" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "Refunded");
    assert_eq!(decimal(&body["data"]["refund"]["amount"]), dec!(50));
    assert!(body["data"]["refund"]["refund_id"]
        .as_str()
        .unwrap()
        .starts_with("RFD_"));
}

#[tokio::test]
async fn monthly_report_counts_delivered_paid_revenue() {
    let app = TestApp::new();
    let biryani = app.seed_food("Veg Biryani", dec!(120)).await;

    let delivered = app
        .place_order(Uuid::new_v4(), vec![line(&biryani, 2)], PaymentMethod::Upi)
        .await;
    app.deliver(delivered.order.id).await;

    let cancelled = app
        .place_order(Uuid::new_v4(), vec![line(&biryani, 1)], PaymentMethod::Upi)
        .await;
    app.state
        .services
        .orders
        .advance(cancelled.order.id, OrderStatus::Cancelled, None)
        .await
        .unwrap();

    // Delivered but cash never collected: excluded from revenue
    let unpaid = app
        .place_order(Uuid::new_v4(), vec![line(&biryani, 1)], PaymentMethod::Cod)
        .await;
    app.deliver(unpaid.order.id).await;

    // Next month
    app.clock.set(at(2025, 4, 2, 5, 0));
    app.place_order(Uuid::new_v4(), vec![line(&biryani, 1)], PaymentMethod::Upi)
        .await;

    let response = app
        .request(Method::GET, "/api/v1/reports/monthly?year=2025&month=3", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let summary = &body["data"]["summary"];
    assert_eq!(summary["total_orders"], 3);
    assert_eq!(summary["delivered_orders"], 2);
    assert_eq!(summary["cancelled_orders"], 1);
    assert_eq!(decimal(&summary["total_revenue"]), delivered.order.total_amount);
    assert_eq!(decimal(&summary["total_gst"]), dec!(12));

    // Defaults to the current local month
    let current = response_json(app.request(Method::GET, "/api/v1/reports/monthly", None).await).await;
    assert_eq!(current["data"]["period"]["month"], 4);
    assert_eq!(current["data"]["summary"]["total_orders"], 1);

    let invalid = app
        .request(Method::GET, "/api/v1/reports/monthly?year=2025&month=13", None)
        .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn last_instant_of_a_month_belongs_to_that_month() {
    let app = TestApp::new();
    let chai = app.seed_food("Masala Chai", dec!(40)).await;

    // 23:59:59.9995 IST on 31 March
    app.clock
        .set(at(2025, 3, 31, 18, 30) - chrono::Duration::microseconds(500));
    app.place_order(Uuid::new_v4(), vec![line(&chai, 2)], PaymentMethod::Upi)
        .await;

    let invoicing = &app.state.services.invoicing;
    let march = invoicing.monthly_report(2025, 3).await.unwrap();
    let april = invoicing.monthly_report(2025, 4).await.unwrap();
    assert_eq!(march.summary.total_orders, 1);
    assert_eq!(april.summary.total_orders, 0);
    assert_eq!(march.period.end, april.period.start);
}
