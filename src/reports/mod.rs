use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Order, OrderStatus};

/// Local calendar month as a UTC range. `end` is the first instant of the next month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub month: u32,
    pub year: i32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Headline figures. Revenue and tax only count orders that were both delivered and paid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSummary {
    pub total_orders: usize,
    pub delivered_orders: usize,
    pub cancelled_orders: usize,
    pub paid_orders: usize,
    pub total_revenue: Decimal,
    pub total_gst: Decimal,
    pub net_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLine {
    pub order_number: String,
    pub date: DateTime<Utc>,
    pub customer: String,
    pub amount: Decimal,
    pub gst: Decimal,
    pub status: OrderStatus,
    pub is_paid: bool,
}

impl From<&Order> for ReportLine {
    fn from(order: &Order) -> Self {
        Self {
            order_number: order.order_number.clone(),
            date: order.created_at,
            customer: order.customer_name.clone(),
            amount: order.total_amount,
            gst: order.gst_or_zero(),
            status: order.status,
            is_paid: order.is_paid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBillingReport {
    pub period: ReportPeriod,
    pub summary: BillingSummary,
    pub orders: Vec<ReportLine>,
}

pub fn summarize(orders: &[Order]) -> BillingSummary {
    let mut summary = BillingSummary {
        total_orders: orders.len(),
        ..Default::default()
    };
    for order in orders {
        match order.status {
            OrderStatus::Delivered => {
                summary.delivered_orders += 1;
                if order.is_paid {
                    summary.total_revenue += order.total_amount;
                    summary.total_gst += order.gst_or_zero();
                }
            }
            OrderStatus::Cancelled => summary.cancelled_orders += 1,
            _ => {}
        }
        if order.is_paid {
            summary.paid_orders += 1;
        }
    }
    summary.net_revenue = summary.total_revenue - summary.total_gst;
    summary
}

/// Builds the report for orders already restricted to `period`, listed newest first.
pub fn monthly_report(period: ReportPeriod, mut orders: Vec<Order>) -> MonthlyBillingReport {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    MonthlyBillingReport {
        summary: summarize(&orders),
        orders: orders.iter().map(ReportLine::from).collect(),
        period,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{at, order};
    use rust_decimal_macros::dec;

    fn with(status: OrderStatus, paid: bool, day: u32) -> Order {
        let mut o = order(&format!("ORD-2025-{:06}", day), at(2025, 3, day, 6, 0));
        o.status = status;
        o.is_paid = paid;
        o
    }

    #[test]
    fn only_delivered_and_paid_orders_earn_revenue() {
        let orders = vec![
            with(OrderStatus::Delivered, true, 1),
            with(OrderStatus::Delivered, false, 2),
            with(OrderStatus::Confirmed, true, 3),
            with(OrderStatus::Cancelled, false, 4),
        ];
        let summary = summarize(&orders);
        assert_eq!(summary.total_orders, 4);
        assert_eq!(summary.delivered_orders, 2);
        assert_eq!(summary.cancelled_orders, 1);
        assert_eq!(summary.paid_orders, 2);
        assert_eq!(summary.total_revenue, dec!(292.50));
        assert_eq!(summary.total_gst, dec!(12.50));
        assert_eq!(summary.net_revenue, dec!(280.00));
    }

    #[test]
    fn legacy_orders_without_tax_count_as_zero_gst() {
        let mut legacy = with(OrderStatus::Delivered, true, 5);
        legacy.gst_amount = None;
        let summary = summarize(&[legacy]);
        assert_eq!(summary.total_gst, dec!(0));
        assert_eq!(summary.net_revenue, summary.total_revenue);
    }

    #[test]
    fn empty_month_is_all_zero() {
        let period = ReportPeriod {
            month: 2,
            year: 2025,
            start: at(2025, 1, 31, 18, 30),
            end: at(2025, 2, 28, 18, 30),
        };
        let report = monthly_report(period, vec![]);
        assert_eq!(report.summary, BillingSummary::default());
        assert!(report.orders.is_empty());
    }

    #[test]
    fn listing_is_newest_first() {
        let period = ReportPeriod {
            month: 3,
            year: 2025,
            start: at(2025, 2, 28, 18, 30),
            end: at(2025, 3, 31, 18, 30),
        };
        let report = monthly_report(
            period,
            vec![with(OrderStatus::Pending, false, 1), with(OrderStatus::Pending, false, 9)],
        );
        assert_eq!(report.orders[0].order_number, "ORD-2025-000009");
        assert_eq!(report.orders[1].gst, dec!(12.50));
    }
}
