//! Builders shared by unit tests.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use super::*;

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn address() -> DeliveryAddress {
    DeliveryAddress {
        name: "Asha Rao".into(),
        phone: "9876543210".into(),
        address_line1: "12 MG Road".into(),
        address_line2: None,
        city: "Pune".into(),
        state: "Maharashtra".into(),
        pincode: "411001".into(),
        full_address: "12 MG Road, Pune, Maharashtra - 411001".into(),
    }
}

pub fn item(name: &str, quantity: u32, unit_price: rust_decimal::Decimal) -> OrderItem {
    OrderItem {
        food_id: Uuid::new_v4(),
        name: name.into(),
        quantity,
        unit_price,
        image: None,
    }
}

/// A confirmed-looking order worth 250 + 12.50 GST + 30 delivery.
pub fn order(order_number: &str, created_at: DateTime<Utc>) -> Order {
    Order {
        id: Uuid::new_v4(),
        order_number: order_number.into(),
        customer_id: Uuid::new_v4(),
        customer_name: "Asha Rao".into(),
        customer_phone: "9876543210".into(),
        customer_email: Some("asha@example.com".into()),
        delivery_address: address(),
        items: vec![item("Paneer Tikka", 2, dec!(100)), item("Lassi", 1, dec!(50))],
        subtotal: dec!(250),
        delivery_fee: dec!(30),
        discount: dec!(0),
        coupon_code: None,
        gst_amount: Some(dec!(12.50)),
        gst_percentage: dec!(5),
        total_amount: dec!(292.50),
        status: OrderStatus::Pending,
        status_history: vec![StatusEntry {
            status: OrderStatus::Pending,
            timestamp: created_at,
            updated_by: None,
        }],
        payment_id: None,
        payment_method: PaymentMethod::Upi,
        is_paid: false,
        paid_at: None,
        is_delivered: false,
        delivered_at: None,
        cancelled_at: None,
        is_archived: false,
        archived_at: None,
        invoice_number: None,
        has_review: false,
        order_notes: None,
        created_at,
        updated_at: created_at,
        version: 1,
    }
}
