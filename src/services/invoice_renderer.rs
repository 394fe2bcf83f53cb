use chrono::FixedOffset;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::Order;
use crate::pdf::{Align, Color, Font, PdfDocument, TextBox, TextStyle};

const COMPANY_NAME: &str = "FreshEats";
const COMPANY_TAGLINE: &str = "Fresh & Delicious Food Delivery";
const COMPANY_GSTIN: &str = "GSTIN: 00XXXXX0000X0XX";

const PRIMARY: Color = Color::rgb(16, 185, 129);
const DARK: Color = Color::rgb(31, 41, 55);
const GRAY: Color = Color::rgb(107, 114, 128);
const RULE: Color = Color::rgb(229, 231, 235);
const TABLE_HEADER: Color = Color::rgb(243, 244, 246);
const PENDING: Color = Color::rgb(245, 158, 11);

const LEFT: f32 = 50.0;
const RIGHT: f32 = 545.0;
const ROW_HEIGHT: f32 = 25.0;
/// Rows below this line continue on the next page
const PAGE_BOTTOM: f32 = 700.0;
const FOOTER_TOP: f32 = 750.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceDocument {
    pub file_name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl InvoiceDocument {
    pub const CONTENT_TYPE: &'static str = "application/pdf";
}

/// Whole-rupee display amount, e.g. `Rs.293`.
pub fn rupees(amount: Decimal) -> String {
    format!(
        "Rs.{}",
        amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// Lays out the tax invoice for a stored order. Every figure is read from the order as saved.
#[derive(Debug, Clone, Copy)]
pub struct InvoiceRenderer {
    offset: FixedOffset,
}

impl InvoiceRenderer {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn render(&self, order: &Order) -> InvoiceDocument {
        let invoice_number = order.invoice_number.as_deref().unwrap_or("N/A");
        let created = order.created_at.with_timezone(&self.offset);

        let mut doc = PdfDocument::a4();
        doc.set_title(format!("Invoice {}", invoice_number));
        doc.set_creation_date(order.created_at.format("D:%Y%m%d%H%M%SZ").to_string());

        self.header(&mut doc, order, invoice_number, &created.format("%-d %b %Y").to_string());
        self.bill_to(&mut doc, order);
        let y = self.items(&mut doc, order);
        let y = self.totals(&mut doc, order, y);
        self.payment(&mut doc, order, y);
        self.footer(&mut doc);

        InvoiceDocument {
            file_name: format!(
                "Invoice-{}.pdf",
                order.invoice_number.as_deref().unwrap_or(&order.order_number)
            ),
            bytes: doc.finish(),
        }
    }

    fn header(&self, doc: &mut PdfDocument, order: &Order, invoice_number: &str, date: &str) {
        let right = Some(TextBox {
            width: RIGHT - 400.0,
            align: Align::Right,
        });
        let detail = TextStyle::new(Font::Helvetica, 10.0, GRAY);

        doc.text(COMPANY_NAME, TextStyle::new(Font::HelveticaBold, 28.0, PRIMARY), LEFT, 50.0, None);
        doc.text(COMPANY_TAGLINE, detail, LEFT, 80.0, None);
        doc.text("TAX INVOICE", TextStyle::new(Font::HelveticaBold, 20.0, DARK), 400.0, 50.0, right);
        doc.text(&format!("Invoice #: {}", invoice_number), detail, 400.0, 75.0, right);
        doc.text(&format!("Order #: {}", order.order_number), detail, 400.0, 90.0, right);
        doc.text(&format!("Date: {}", date), detail, 400.0, 105.0, right);
        doc.text(&format!("Status: {}", order.status), detail, 400.0, 120.0, right);
        doc.line((LEFT, 140.0), (RIGHT, 140.0), RULE, 1.0);
    }

    fn bill_to(&self, doc: &mut PdfDocument, order: &Order) {
        let detail = TextStyle::new(Font::Helvetica, 10.0, GRAY);
        let address = &order.delivery_address;

        doc.text("BILL TO:", TextStyle::new(Font::HelveticaBold, 12.0, PRIMARY), LEFT, 155.0, None);
        let name = if order.customer_name.trim().is_empty() {
            "Customer"
        } else {
            order.customer_name.as_str()
        };
        doc.text(name, TextStyle::new(Font::HelveticaBold, 11.0, DARK), LEFT, 175.0, None);
        doc.text(&address.address_line1, detail, LEFT, 190.0, None);
        let mut top = 205.0;
        if let Some(line2) = address.address_line2.as_deref().filter(|l| !l.trim().is_empty()) {
            doc.text(line2, detail, LEFT, top, None);
            top += 15.0;
        }
        doc.text(
            &format!("{}, {} - {}", address.city, address.state, address.pincode),
            detail,
            LEFT,
            top,
            None,
        );
        let phone = if order.customer_phone.is_empty() {
            address.phone.as_str()
        } else {
            order.customer_phone.as_str()
        };
        doc.text(&format!("Phone: {}", phone), detail, LEFT, top + 15.0, None);
    }

    fn table_header(&self, doc: &mut PdfDocument, top: f32) {
        let style = TextStyle::new(Font::HelveticaBold, 10.0, DARK);
        doc.fill_rect(LEFT, top, RIGHT - LEFT, ROW_HEIGHT, TABLE_HEADER);
        doc.text("ITEM", style, 60.0, top + 8.0, None);
        doc.text("QTY", style, 320.0, top + 8.0, Some(TextBox { width: 50.0, align: Align::Center }));
        doc.text("PRICE", style, 380.0, top + 8.0, Some(TextBox { width: 70.0, align: Align::Right }));
        doc.text("TOTAL", style, 460.0, top + 8.0, Some(TextBox { width: 75.0, align: Align::Right }));
    }

    /// Returns the top of the first free row after the table.
    fn items(&self, doc: &mut PdfDocument, order: &Order) -> f32 {
        let style = TextStyle::new(Font::Helvetica, 10.0, DARK);
        let table_top = 265.0;
        self.table_header(doc, table_top);

        let mut y = table_top + 35.0;
        for item in &order.items {
            if y > PAGE_BOTTOM {
                doc.new_page();
                self.table_header(doc, LEFT);
                y = LEFT + 35.0;
            }
            doc.text(&item.name, style, 60.0, y, None);
            doc.text(
                &item.quantity.to_string(),
                style,
                320.0,
                y,
                Some(TextBox { width: 50.0, align: Align::Center }),
            );
            doc.text(
                &rupees(item.unit_price),
                style,
                380.0,
                y,
                Some(TextBox { width: 70.0, align: Align::Right }),
            );
            doc.text(
                &item
                    .unit_price
                    .checked_mul(Decimal::from(item.quantity))
                    .map_or_else(|| "-".to_string(), rupees),
                style,
                460.0,
                y,
                Some(TextBox { width: 75.0, align: Align::Right }),
            );
            y += ROW_HEIGHT;
            doc.line((LEFT, y - 5.0), (RIGHT, y - 5.0), RULE, 1.0);
        }
        y
    }

    fn totals(&self, doc: &mut PdfDocument, order: &Order, after_items: f32) -> f32 {
        let mut lines: Vec<(String, String, Color)> = vec![
            ("Subtotal:".to_string(), rupees(order.subtotal), DARK),
            (
                format!("GST ({}%):", order.gst_percentage.normalize()),
                rupees(order.gst_or_zero()),
                DARK,
            ),
            (
                "Delivery:".to_string(),
                if order.is_free_delivery() {
                    "FREE".to_string()
                } else {
                    rupees(order.delivery_fee)
                },
                PRIMARY,
            ),
        ];
        if !order.discount.is_zero() {
            lines.push((
                "Discount:".to_string(),
                format!("-{}", rupees(order.discount)),
                PRIMARY,
            ));
        }

        let needed = lines.len() as f32 * 18.0 + 130.0;
        let mut top = after_items + 20.0;
        if top + needed > FOOTER_TOP {
            doc.new_page();
            top = LEFT;
        }

        let label = TextStyle::new(Font::Helvetica, 10.0, GRAY);
        let value_box = Some(TextBox { width: 75.0, align: Align::Right });
        for (index, (name, value, color)) in lines.iter().enumerate() {
            let row = top + index as f32 * 18.0;
            doc.text(name, label, 360.0, row, Some(TextBox { width: 90.0, align: Align::Right }));
            doc.text(value, TextStyle::new(Font::Helvetica, 10.0, *color), 460.0, row, value_box);
        }

        let total_top = top + lines.len() as f32 * 18.0 + 5.0;
        let emphasis = TextStyle::new(Font::HelveticaBold, 12.0, Color::WHITE);
        doc.fill_rect(350.0, total_top, RIGHT - 350.0, 30.0, PRIMARY);
        doc.text("GRAND TOTAL:", emphasis, 355.0, total_top + 9.0, Some(TextBox { width: 95.0, align: Align::Right }));
        doc.text(&rupees(order.total_amount), emphasis, 460.0, total_top + 9.0, value_box);

        total_top + 55.0
    }

    fn payment(&self, doc: &mut PdfDocument, order: &Order, top: f32) {
        doc.text("Payment Method:", TextStyle::new(Font::HelveticaBold, 10.0, DARK), LEFT, top, None);
        doc.text(
            order.payment_method.display_name(),
            TextStyle::new(Font::Helvetica, 10.0, GRAY),
            150.0,
            top,
            None,
        );
        let (label, color) = if order.is_paid {
            ("PAID", PRIMARY)
        } else {
            ("PENDING", PENDING)
        };
        doc.text(label, TextStyle::new(Font::HelveticaBold, 10.0, color), 270.0, top, None);
    }

    fn footer(&self, doc: &mut PdfDocument) {
        let style = TextStyle::new(Font::Helvetica, 9.0, GRAY);
        let centered = Some(TextBox {
            width: RIGHT - LEFT,
            align: Align::Center,
        });
        doc.line((LEFT, FOOTER_TOP), (RIGHT, FOOTER_TOP), RULE, 1.0);
        doc.text("Thank you for ordering with FreshEats!", style, LEFT, FOOTER_TOP + 15.0, centered);
        doc.text(COMPANY_GSTIN, style, LEFT, FOOTER_TOP + 30.0, centered);
        doc.text("This is a computer generated invoice.", style, LEFT, FOOTER_TOP + 45.0, centered);
    }
}
