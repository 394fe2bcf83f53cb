use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::invoice_renderer::{InvoiceDocument, InvoiceRenderer};
use super::pricing::gst_on;
use super::sequence::{retry_on_collision, SequenceAllocator};
use super::ServiceSettings;
use crate::common::{local_year, month_bounds};
use crate::errors::ServiceError;
use crate::models::{Order, OrderFilter};
use crate::reports::{self, MonthlyBillingReport, ReportPeriod};
use crate::repositories::OrderRepository;

/// Rate applied to orders saved before tax was captured at checkout
const LEGACY_GST_PERCENTAGE: Decimal = dec!(5);
/// Reload-and-retry rounds when another writer touches the order mid-assignment
const VERSION_RACE_ROUNDS: u32 = 3;

#[derive(Clone)]
pub struct InvoicingService {
    orders: Arc<dyn OrderRepository>,
    allocator: SequenceAllocator,
    renderer: InvoiceRenderer,
    settings: ServiceSettings,
}

impl InvoicingService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        allocator: SequenceAllocator,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            orders,
            allocator,
            renderer: InvoiceRenderer::new(settings.utc_offset),
            settings,
        }
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Assigns the order's invoice number once and backfills missing tax in the same save.
    /// Safe to call repeatedly and concurrently: everyone ends up with the same number.
    #[instrument(skip(self))]
    pub async fn ensure_invoice_number(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        for _ in 0..VERSION_RACE_ROUNDS {
            let order = self.load(order_id).await?;
            if order.invoice_number.is_some() && order.gst_amount.is_some() {
                return Ok(order);
            }

            let year = local_year(order.created_at, self.settings.utc_offset);
            let outcome = retry_on_collision(self.settings.sequence_attempts, |_| {
                let mut candidate = order.clone();
                async move {
                    if candidate.invoice_number.is_none() {
                        candidate.invoice_number =
                            Some(self.allocator.next_invoice_number(year).await?);
                    }
                    if candidate.gst_amount.is_none() {
                        candidate.gst_amount = Some(gst_on(candidate.subtotal, LEGACY_GST_PERCENTAGE));
                        candidate.gst_percentage = LEGACY_GST_PERCENTAGE;
                    }
                    self.orders.save_order(&candidate).await
                }
            })
            .await;

            match outcome {
                Ok(saved) => {
                    info!(
                        order_number = %saved.order_number,
                        invoice_number = ?saved.invoice_number,
                        "Invoice number assigned"
                    );
                    return Ok(saved);
                }
                Err(ServiceError::ConcurrentModification(_)) => {
                    warn!(order_id = %order_id, "Order changed during invoice assignment, reloading");
                }
                Err(e) => return Err(e),
            }
        }
        Err(ServiceError::ConcurrentModification(order_id))
    }

    pub fn render(&self, order: &Order) -> InvoiceDocument {
        self.renderer.render(order)
    }

    #[instrument(skip(self))]
    pub async fn invoice_for_order(&self, order_id: Uuid) -> Result<InvoiceDocument, ServiceError> {
        let order = self.ensure_invoice_number(order_id).await?;
        Ok(self.render(&order))
    }

    /// Billing report for a local calendar month, archived orders included.
    #[instrument(skip(self))]
    pub async fn monthly_report(
        &self,
        year: i32,
        month: u32,
    ) -> Result<MonthlyBillingReport, ServiceError> {
        let (start, end) = month_bounds(year, month, self.settings.utc_offset)?;
        let orders = self
            .orders
            .find_orders(&OrderFilter::created_between(start, end))
            .await?;
        Ok(reports::monthly_report(
            ReportPeriod {
                month,
                year,
                start,
                end,
            },
            orders,
        ))
    }
}
