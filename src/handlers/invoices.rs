use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Datelike;
use serde::Deserialize;
use uuid::Uuid;

use super::common::ApiResponse;
use crate::{
    errors::ServiceError,
    reports::MonthlyBillingReport,
    services::invoice_renderer::InvoiceDocument,
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct MonthlyReportQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl IntoResponse for InvoiceDocument {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename={}", self.file_name);
        (
            [
                (header::CONTENT_TYPE, InvoiceDocument::CONTENT_TYPE.to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.bytes,
        )
            .into_response()
    }
}

/// Download the order's tax invoice, assigning the invoice number on first request
pub async fn download_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<InvoiceDocument, ServiceError> {
    state.services.invoicing.invoice_for_order(id).await
}

/// Billing summary for a calendar month; defaults to the current local month
pub async fn monthly_report(
    State(state): State<AppState>,
    Query(query): Query<MonthlyReportQuery>,
) -> Result<Json<ApiResponse<MonthlyBillingReport>>, ServiceError> {
    let today = state
        .clock
        .now()
        .with_timezone(&state.settings.utc_offset)
        .date_naive();
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or_else(|| today.month());
    let report = state.services.invoicing.monthly_report(year, month).await?;
    Ok(Json(ApiResponse::success(report)))
}
