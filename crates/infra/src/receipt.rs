//! Receipt generation boundary.
//!
//! The production receipt is rendered by an external templating service;
//! this crate only fixes the data contract and ships a plain-text renderer
//! good enough for an email attachment.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rihla_core::RegistrantId;
use rihla_invoicing::{Invoice, PaymentCategory};
use rihla_registrants::{Registrant, RoomType};

#[derive(Debug, Error)]
#[error("receipt rendering failed: {0}")]
pub struct ReceiptError(pub String);

/// Everything a receipt template needs, assembled by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptData {
    pub invoice_number: String,
    pub registrant_id: RegistrantId,
    pub registrant_name: String,
    pub address: String,
    pub phone: String,
    pub program_name: String,
    pub room_type: RoomType,
    pub package_price: Decimal,
    pub category: PaymentCategory,
    pub payment_method: Option<String>,
    pub amount_paid: Decimal,
    pub amount_remaining: Decimal,
    pub currency: String,
    pub discount: Decimal,
    pub issued_at: DateTime<Utc>,
}

impl ReceiptData {
    pub fn assemble(
        invoice: &Invoice,
        registrant: &Registrant,
        program_name: impl Into<String>,
        payment_method: Option<String>,
    ) -> Self {
        Self {
            invoice_number: invoice.number.to_string(),
            registrant_id: registrant.id.clone(),
            registrant_name: registrant.name.clone(),
            address: registrant.address.clone(),
            phone: registrant.phone.clone(),
            program_name: program_name.into(),
            room_type: invoice.room_type,
            package_price: invoice.package_price,
            category: invoice.category,
            payment_method,
            amount_paid: invoice.payment_amount,
            amount_remaining: invoice.remaining,
            currency: invoice.currency.clone(),
            discount: Decimal::ZERO,
            issued_at: invoice.issued_at,
        }
    }
}

/// Renders a receipt document from assembled invoice data.
pub trait ReceiptRenderer: Send + Sync {
    fn render(&self, receipt: &ReceiptData) -> Result<Vec<u8>, ReceiptError>;
}

/// Plain-text receipt renderer.
#[derive(Debug, Default, Clone)]
pub struct TextReceiptRenderer;

impl TextReceiptRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ReceiptRenderer for TextReceiptRenderer {
    fn render(&self, receipt: &ReceiptData) -> Result<Vec<u8>, ReceiptError> {
        use std::fmt::Write;

        let mut out = String::new();
        let mut line = |label: &str, value: String| {
            writeln!(out, "{label:<18}: {value}").expect("writing to a String cannot fail");
        };

        line("Invoice", receipt.invoice_number.clone());
        line("Date", receipt.issued_at.format("%Y-%m-%d %H:%M UTC").to_string());
        line("Registrant", format!("{} ({})", receipt.registrant_name, receipt.registrant_id));
        line("Address", receipt.address.clone());
        line("Phone", receipt.phone.clone());
        line("Program", receipt.program_name.clone());
        line("Room type", receipt.room_type.to_string());
        line(
            "Package price",
            format!("{} {}", receipt.currency, receipt.package_price),
        );
        line("Discount", format!("{} {}", receipt.currency, receipt.discount));
        if let Some(method) = &receipt.payment_method {
            line("Payment method", method.clone());
        }
        line("Category", receipt.category.to_string());
        line("Amount paid", format!("{} {}", receipt.currency, receipt.amount_paid));
        line(
            "Remaining",
            format!("{} {}", receipt.currency, receipt.amount_remaining),
        );

        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rihla_core::PackageId;
    use rihla_invoicing::InvoiceNumber;

    fn test_receipt() -> ReceiptData {
        ReceiptData {
            invoice_number: InvoiceNumber::new(2024, 13).unwrap().to_string(),
            registrant_id: "3174012345678901".parse().unwrap(),
            registrant_name: "Siti Aminah".to_string(),
            address: "Jl. Kebon Jeruk 5, Jakarta".to_string(),
            phone: "+62 812 3456 7890".to_string(),
            program_name: "Umrah Ramadhan 12 Hari".to_string(),
            room_type: RoomType::Quad,
            package_price: Decimal::from(15_000_000),
            category: PaymentCategory::Dp,
            payment_method: Some("bank transfer".to_string()),
            amount_paid: Decimal::from(5_000_000),
            amount_remaining: Decimal::from(10_000_000),
            currency: "IDR".to_string(),
            discount: Decimal::ZERO,
            issued_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn text_receipt_carries_the_load_bearing_fields() {
        let bytes = TextReceiptRenderer::new().render(&test_receipt()).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("20240013"));
        assert!(text.contains("Siti Aminah (3174012345678901)"));
        assert!(text.contains("DP"));
        assert!(text.contains("IDR 5000000"));
        assert!(text.contains("IDR 10000000"));
    }

    #[test]
    fn assemble_pulls_fields_from_invoice_and_registrant() {
        let registrant = Registrant::new_pending(
            "3174012345678901".parse().unwrap(),
            "Siti Aminah",
            "siti@example.com",
            "+62 812 3456 7890",
            "Jl. Kebon Jeruk 5, Jakarta",
            PackageId::new(),
            RoomType::Quad,
        );
        let invoice = Invoice::issue(
            InvoiceNumber::new(2024, 13).unwrap(),
            registrant.id.clone(),
            registrant.package_id,
            registrant.room_type,
            Decimal::from(15_000_000),
            Decimal::from(5_000_000),
            "IDR",
            Utc::now(),
        )
        .unwrap();

        let receipt = ReceiptData::assemble(&invoice, &registrant, "Umrah Ramadhan 12 Hari", None);
        assert_eq!(receipt.invoice_number, "20240013");
        assert_eq!(receipt.amount_remaining, Decimal::from(10_000_000));
        assert_eq!(receipt.category, PaymentCategory::Dp);
        assert_eq!(receipt.discount, Decimal::ZERO);
    }
}
