use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::ratings::average;
use crate::common::{local_date, local_day_start, month_bounds, Clock};
use crate::errors::ServiceError;
use crate::models::{Order, OrderFilter, OrderStatus, PaymentFilter, ReviewFilter};
use crate::repositories::{OrderRepository, ReviewRepository};

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const MAX_WINDOW_DAYS: u32 = 365;
pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

const STATUSES: [OrderStatus; 6] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Preparing,
    OrderStatus::OutForDelivery,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenueGranularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl RevenueGranularity {
    /// Bucket label for a local date: `2025-03-01`, `2025-W09` or `2025-03`.
    pub fn bucket(self, date: NaiveDate) -> String {
        match self {
            RevenueGranularity::Daily => date.format("%Y-%m-%d").to_string(),
            RevenueGranularity::Weekly => {
                let week = date.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            RevenueGranularity::Monthly => date.format("%Y-%m").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenuePoint {
    pub bucket: String,
    pub revenue: Decimal,
    pub orders: usize,
    pub gst: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStats {
    /// Live orders per status; archived orders are left out
    pub status_distribution: Vec<StatusCount>,
    pub today_orders: usize,
    pub total_orders: usize,
    pub delivered_orders: usize,
    pub cancelled_orders: usize,
    /// Delivered share of all orders, in percent at one decimal
    pub delivery_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopFood {
    pub food_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub total_quantity: u64,
    pub total_revenue: Decimal,
    pub order_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopCustomer {
    pub customer_id: Uuid,
    pub customer_name: String,
    pub email: Option<String>,
    pub total_spent: Decimal,
    pub order_count: usize,
    pub avg_order_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_orders: usize,
    pub today_orders: usize,
    pub month_orders: usize,
    pub total_revenue: Decimal,
    pub today_revenue: Decimal,
    pub month_revenue: Decimal,
    pub total_gst: Decimal,
    /// Mean overall review rating; `None` before the first review
    pub avg_rating: Option<Decimal>,
    pub total_customers: usize,
    pub generated_at: DateTime<Utc>,
}

/// Revenue only counts orders that were both delivered and paid.
fn earns_revenue(order: &Order) -> bool {
    order.status == OrderStatus::Delivered && order.is_paid
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn check_limit(limit: usize) -> Result<usize, ServiceError> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ServiceError::ValidationError(format!(
            "Limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    Ok(limit)
}

/// Buckets delivered and paid orders by local date. Every bucket between `first_day` and
/// `last_day` is present, empty ones at zero.
pub fn revenue_series(
    orders: &[Order],
    granularity: RevenueGranularity,
    first_day: NaiveDate,
    last_day: NaiveDate,
    offset: FixedOffset,
) -> Vec<RevenuePoint> {
    let mut buckets: BTreeMap<String, RevenuePoint> = BTreeMap::new();
    let mut day = Some(first_day);
    while let Some(current) = day.filter(|d| *d <= last_day) {
        let bucket = granularity.bucket(current);
        buckets.entry(bucket.clone()).or_insert(RevenuePoint {
            bucket,
            revenue: Decimal::ZERO,
            orders: 0,
            gst: Decimal::ZERO,
        });
        day = current.succ_opt();
    }

    for order in orders.iter().filter(|o| earns_revenue(o)) {
        let date = local_date(order.created_at, offset);
        if date < first_day || date > last_day {
            continue;
        }
        if let Some(point) = buckets.get_mut(&granularity.bucket(date)) {
            point.revenue += order.total_amount;
            point.gst += order.gst_or_zero();
            point.orders += 1;
        }
    }
    buckets.into_values().collect()
}

/// Best sellers by quantity across delivered orders.
pub fn rank_foods(orders: &[Order], limit: usize) -> Vec<TopFood> {
    let mut foods: HashMap<Uuid, TopFood> = HashMap::new();
    for order in orders.iter().filter(|o| o.status == OrderStatus::Delivered) {
        for item in &order.items {
            let entry = foods.entry(item.food_id).or_insert_with(|| TopFood {
                food_id: item.food_id,
                name: item.name.clone(),
                image: item.image.clone(),
                total_quantity: 0,
                total_revenue: Decimal::ZERO,
                order_count: 0,
            });
            entry.total_quantity += u64::from(item.quantity);
            entry.total_revenue = entry
                .total_revenue
                .saturating_add(item.unit_price.saturating_mul(Decimal::from(item.quantity)));
            entry.order_count += 1;
        }
    }

    let mut ranked: Vec<TopFood> = foods.into_values().collect();
    ranked.sort_by(|a, b| {
        b.total_quantity
            .cmp(&a.total_quantity)
            .then_with(|| b.total_revenue.cmp(&a.total_revenue))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(limit);
    ranked
}

/// Biggest spenders across delivered and paid orders.
pub fn rank_customers(orders: &[Order], limit: usize) -> Vec<TopCustomer> {
    let mut customers: HashMap<Uuid, TopCustomer> = HashMap::new();
    for order in orders.iter().filter(|o| earns_revenue(o)) {
        let entry = customers.entry(order.customer_id).or_insert_with(|| TopCustomer {
            customer_id: order.customer_id,
            customer_name: order.customer_name.clone(),
            email: None,
            total_spent: Decimal::ZERO,
            order_count: 0,
            avg_order_value: Decimal::ZERO,
        });
        if entry.email.is_none() {
            entry.email = order.customer_email.clone();
        }
        entry.total_spent += order.total_amount;
        entry.order_count += 1;
    }

    let mut ranked: Vec<TopCustomer> = customers
        .into_values()
        .map(|mut customer| {
            customer.avg_order_value =
                money(customer.total_spent / Decimal::from(customer.order_count as u64));
            customer
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.total_spent
            .cmp(&a.total_spent)
            .then_with(|| b.order_count.cmp(&a.order_count))
            .then_with(|| a.customer_name.cmp(&b.customer_name))
    });
    ranked.truncate(limit);
    ranked
}

/// Admin dashboard figures computed from stored orders and reviews.
#[derive(Clone)]
pub struct AnalyticsService {
    orders: Arc<dyn OrderRepository>,
    reviews: Arc<dyn ReviewRepository>,
    clock: Arc<dyn Clock>,
    utc_offset: FixedOffset,
}

impl AnalyticsService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        reviews: Arc<dyn ReviewRepository>,
        clock: Arc<dyn Clock>,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            orders,
            reviews,
            clock,
            utc_offset,
        }
    }

    async fn every_order(&self) -> Result<Vec<Order>, ServiceError> {
        self.orders
            .find_orders(&OrderFilter {
                include_archived: true,
                ..Default::default()
            })
            .await
    }

    /// Revenue over the last `days` local days, today included.
    #[instrument(skip(self))]
    pub async fn revenue(
        &self,
        granularity: RevenueGranularity,
        days: u32,
    ) -> Result<Vec<RevenuePoint>, ServiceError> {
        if days == 0 || days > MAX_WINDOW_DAYS {
            return Err(ServiceError::ValidationError(format!(
                "Days must be between 1 and {}",
                MAX_WINDOW_DAYS
            )));
        }
        let now = self.clock.now();
        let last_day = local_date(now, self.utc_offset);
        let first_day = local_date(now - Duration::days(i64::from(days) - 1), self.utc_offset);
        let from = local_day_start(now - Duration::days(i64::from(days) - 1), self.utc_offset)?;

        let orders = self
            .orders
            .find_orders(&OrderFilter {
                status: Some(OrderStatus::Delivered),
                from: Some(from),
                payment: Some(PaymentFilter::Paid),
                include_archived: true,
                ..Default::default()
            })
            .await?;
        debug!(orders = orders.len(), "Building revenue series");
        Ok(revenue_series(
            &orders,
            granularity,
            first_day,
            last_day,
            self.utc_offset,
        ))
    }

    pub async fn order_stats(&self) -> Result<OrderStats, ServiceError> {
        let orders = self.every_order().await?;
        let today = local_day_start(self.clock.now(), self.utc_offset)?;

        let status_distribution = STATUSES
            .iter()
            .map(|status| StatusCount {
                status: *status,
                count: orders
                    .iter()
                    .filter(|o| !o.is_archived && o.status == *status)
                    .count(),
            })
            .collect();
        let delivered_orders = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Delivered)
            .count();
        let cancelled_orders = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Cancelled)
            .count();
        let delivery_rate = if orders.is_empty() {
            Decimal::ZERO
        } else {
            (Decimal::from(delivered_orders as u64) * Decimal::ONE_HUNDRED
                / Decimal::from(orders.len() as u64))
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
        };

        Ok(OrderStats {
            status_distribution,
            today_orders: orders.iter().filter(|o| o.created_at >= today).count(),
            total_orders: orders.len(),
            delivered_orders,
            cancelled_orders,
            delivery_rate,
        })
    }

    pub async fn top_foods(&self, limit: usize) -> Result<Vec<TopFood>, ServiceError> {
        let limit = check_limit(limit)?;
        let orders = self.every_order().await?;
        Ok(rank_foods(&orders, limit))
    }

    pub async fn top_customers(&self, limit: usize) -> Result<Vec<TopCustomer>, ServiceError> {
        let limit = check_limit(limit)?;
        let orders = self.every_order().await?;
        Ok(rank_customers(&orders, limit))
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<DashboardSummary, ServiceError> {
        let now = self.clock.now();
        let today = local_day_start(now, self.utc_offset)?;
        let local = now.with_timezone(&self.utc_offset);
        let (month_start, _) = month_bounds(local.year(), local.month(), self.utc_offset)?;

        let orders = self.every_order().await?;
        let revenue_since = |since: DateTime<Utc>| -> Decimal {
            orders
                .iter()
                .filter(|o| earns_revenue(o) && o.created_at >= since)
                .map(|o| o.total_amount)
                .sum()
        };

        let reviews = self.reviews.find_reviews(&ReviewFilter::default()).await?;
        let overall: Vec<u8> = reviews.iter().map(|r| r.overall_rating).collect();
        let avg_rating = (!overall.is_empty()).then(|| average(&overall).avg_rating);

        Ok(DashboardSummary {
            total_orders: orders.len(),
            today_orders: orders.iter().filter(|o| o.created_at >= today).count(),
            month_orders: orders.iter().filter(|o| o.created_at >= month_start).count(),
            total_revenue: orders
                .iter()
                .filter(|o| earns_revenue(o))
                .map(|o| o.total_amount)
                .sum(),
            today_revenue: revenue_since(today),
            month_revenue: revenue_since(month_start),
            total_gst: orders
                .iter()
                .filter(|o| earns_revenue(o))
                .map(|o| o.gst_or_zero())
                .sum(),
            avg_rating,
            total_customers: orders
                .iter()
                .map(|o| o.customer_id)
                .collect::<HashSet<_>>()
                .len(),
            generated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FixedClock;
    use crate::models::fixtures::{at, order};
    use crate::models::{FoodRating, Review};
    use crate::repositories::InMemoryStore;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn placed(number: u32, created_at: DateTime<Utc>, status: OrderStatus, paid: bool) -> Order {
        let mut o = order(&format!("ORD-2025-{:06}", number), created_at);
        o.status = status;
        o.is_paid = paid;
        o
    }

    struct Harness {
        store: Arc<InMemoryStore>,
        service: AnalyticsService,
    }

    fn harness(now: DateTime<Utc>) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let service = AnalyticsService::new(
            store.clone(),
            store.clone(),
            Arc::new(FixedClock::new(now)),
            ist(),
        );
        Harness { store, service }
    }

    #[rstest]
    #[case(RevenueGranularity::Daily, "2025-03-01")]
    #[case(RevenueGranularity::Weekly, "2025-W09")]
    #[case(RevenueGranularity::Monthly, "2025-03")]
    fn bucket_labels(#[case] granularity: RevenueGranularity, #[case] label: &str) {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(granularity.bucket(date), label);
    }

    #[test]
    fn daily_series_fills_quiet_days() {
        let orders = vec![
            placed(1, at(2025, 3, 1, 6, 0), OrderStatus::Delivered, true),
            placed(2, at(2025, 3, 3, 6, 0), OrderStatus::Delivered, true),
            placed(3, at(2025, 3, 3, 7, 0), OrderStatus::Delivered, false),
            placed(4, at(2025, 3, 3, 8, 0), OrderStatus::Cancelled, true),
        ];
        let series = revenue_series(
            &orders,
            RevenueGranularity::Daily,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            ist(),
        );
        let labels: Vec<&str> = series.iter().map(|p| p.bucket.as_str()).collect();
        assert_eq!(labels, vec!["2025-03-01", "2025-03-02", "2025-03-03"]);
        assert_eq!(series[0].orders, 1);
        assert_eq!(series[0].revenue, orders[0].total_amount);
        assert_eq!(series[1].orders, 0);
        assert_eq!(series[1].revenue, dec!(0));
        assert_eq!(series[2].orders, 1);
        assert_eq!(series[2].gst, orders[1].gst_or_zero());
    }

    #[test]
    fn buckets_follow_the_local_calendar() {
        // 19:00 UTC on Mar 31 is already April in IST
        let orders = vec![placed(1, at(2025, 3, 31, 19, 0), OrderStatus::Delivered, true)];
        let series = revenue_series(
            &orders,
            RevenueGranularity::Monthly,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 30).unwrap(),
            ist(),
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].orders, 0);
        assert_eq!(series[1].bucket, "2025-04");
        assert_eq!(series[1].orders, 1);
    }

    #[test]
    fn foods_rank_by_quantity() {
        let mut big = placed(1, at(2025, 3, 1, 6, 0), OrderStatus::Delivered, true);
        big.items[0].quantity = 10;
        let mut repeat = placed(2, at(2025, 3, 2, 6, 0), OrderStatus::Delivered, false);
        repeat.items = vec![big.items[1].clone()];
        let mut pending = placed(3, at(2025, 3, 2, 7, 0), OrderStatus::Preparing, true);
        pending.items[0].quantity = 500;

        let ranked = rank_foods(&[big.clone(), repeat, pending], 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].food_id, big.items[0].food_id);
        assert_eq!(ranked[0].total_quantity, 10);
        assert_eq!(
            ranked[0].total_revenue,
            big.items[0].unit_price * Decimal::from(10u32)
        );
        assert_eq!(ranked[1].order_count, 2);
        assert_eq!(rank_foods(&[big], 1).len(), 1);
    }

    #[test]
    fn customers_rank_by_spend() {
        let regular = Uuid::new_v4();
        let mut first = placed(1, at(2025, 3, 1, 6, 0), OrderStatus::Delivered, true);
        first.customer_id = regular;
        first.total_amount = dec!(300);
        first.customer_email = None;
        let mut second = placed(2, at(2025, 3, 2, 6, 0), OrderStatus::Delivered, true);
        second.customer_id = regular;
        second.total_amount = dec!(201);
        second.customer_email = Some("asha.rao@example.com".into());
        let mut one_off = placed(3, at(2025, 3, 2, 7, 0), OrderStatus::Delivered, true);
        one_off.total_amount = dec!(450);
        let unpaid = placed(4, at(2025, 3, 2, 8, 0), OrderStatus::Delivered, false);

        let ranked = rank_customers(&[first, second, one_off, unpaid], 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].customer_id, regular);
        assert_eq!(ranked[0].total_spent, dec!(501));
        assert_eq!(ranked[0].order_count, 2);
        assert_eq!(ranked[0].avg_order_value, dec!(250.50));
        assert_eq!(ranked[0].email.as_deref(), Some("asha.rao@example.com"));
        assert_eq!(ranked[1].total_spent, dec!(450));
    }

    #[tokio::test]
    async fn revenue_window_is_checked() {
        let h = harness(at(2025, 3, 10, 6, 0));
        assert_matches!(
            h.service.revenue(RevenueGranularity::Daily, 0).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            h.service.revenue(RevenueGranularity::Daily, 366).await,
            Err(ServiceError::ValidationError(_))
        );
        let series = h.service.revenue(RevenueGranularity::Daily, 7).await.unwrap();
        assert_eq!(series.len(), 7);
        assert_eq!(series[6].bucket, "2025-03-10");
    }

    #[tokio::test]
    async fn revenue_skips_orders_before_the_window() {
        let h = harness(at(2025, 3, 10, 6, 0));
        let old = placed(1, at(2025, 3, 1, 6, 0), OrderStatus::Delivered, true);
        let recent = placed(2, at(2025, 3, 9, 6, 0), OrderStatus::Delivered, true);
        h.store.insert_order(&old).await.unwrap();
        h.store.insert_order(&recent).await.unwrap();

        let series = h.service.revenue(RevenueGranularity::Weekly, 3).await.unwrap();
        let total: usize = series.iter().map(|p| p.orders).sum();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn order_stats_leave_archived_out_of_the_distribution() {
        let h = harness(at(2025, 3, 10, 6, 0));
        let mut archived = placed(1, at(2025, 3, 1, 6, 0), OrderStatus::Delivered, true);
        archived.is_archived = true;
        let today = placed(2, at(2025, 3, 10, 5, 0), OrderStatus::Cancelled, false);
        let other = placed(3, at(2025, 3, 9, 5, 0), OrderStatus::Preparing, true);
        for o in [&archived, &today, &other] {
            h.store.insert_order(o).await.unwrap();
        }

        let stats = h.service.order_stats().await.unwrap();
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.today_orders, 1);
        assert_eq!(stats.delivered_orders, 1);
        assert_eq!(stats.cancelled_orders, 1);
        assert_eq!(stats.delivery_rate, dec!(33.3));
        assert_eq!(stats.status_distribution.len(), 6);
        let delivered = stats
            .status_distribution
            .iter()
            .find(|c| c.status == OrderStatus::Delivered)
            .unwrap();
        assert_eq!(delivered.count, 0);
    }

    #[tokio::test]
    async fn limits_are_bounded() {
        let h = harness(at(2025, 3, 10, 6, 0));
        assert_matches!(h.service.top_foods(0).await, Err(ServiceError::ValidationError(_)));
        assert_matches!(
            h.service.top_customers(MAX_LIMIT + 1).await,
            Err(ServiceError::ValidationError(_))
        );
        assert!(h.service.top_foods(DEFAULT_LIMIT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dashboard_splits_today_and_month() {
        let h = harness(at(2025, 3, 10, 6, 0));
        let last_month = placed(1, at(2025, 2, 20, 6, 0), OrderStatus::Delivered, true);
        let this_month = placed(2, at(2025, 3, 5, 6, 0), OrderStatus::Delivered, true);
        let today = placed(3, at(2025, 3, 10, 4, 0), OrderStatus::Delivered, true);
        let unpaid = placed(4, at(2025, 3, 10, 5, 0), OrderStatus::Confirmed, false);
        for o in [&last_month, &this_month, &today, &unpaid] {
            h.store.insert_order(o).await.unwrap();
        }
        h.store
            .insert_review(&Review {
                id: Uuid::new_v4(),
                order_id: today.id,
                customer_id: today.customer_id,
                food_ratings: vec![FoodRating {
                    food_id: today.items[0].food_id,
                    rating: 4,
                    comment: None,
                }],
                delivery_rating: 5,
                overall_rating: 4,
                comment: None,
                admin_response: None,
                responded_at: None,
                created_at: at(2025, 3, 10, 5, 30),
            })
            .await
            .unwrap();

        let summary = h.service.dashboard().await.unwrap();
        let each = today.total_amount;
        assert_eq!(summary.total_orders, 4);
        assert_eq!(summary.today_orders, 2);
        assert_eq!(summary.month_orders, 3);
        assert_eq!(summary.total_revenue, each * dec!(3));
        assert_eq!(summary.month_revenue, each * dec!(2));
        assert_eq!(summary.today_revenue, each);
        assert_eq!(summary.total_gst, today.gst_or_zero() * dec!(3));
        assert_eq!(summary.avg_rating, Some(dec!(4)));
        assert_eq!(summary.total_customers, 4);
        assert_eq!(summary.generated_at, at(2025, 3, 10, 6, 0));
    }

    #[tokio::test]
    async fn dashboard_before_any_review_has_no_rating() {
        let h = harness(at(2025, 3, 10, 6, 0));
        let summary = h.service.dashboard().await.unwrap();
        assert_eq!(summary.avg_rating, None);
        assert_eq!(summary.total_revenue, dec!(0));
    }
}
