//! The invoice record issued once per successful payment verification.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rihla_core::{DomainError, DomainResult, PackageId, RegistrantId};
use rihla_registrants::RoomType;

use crate::number::InvoiceNumber;

/// Payment category printed on the receipt: down payment or paid in full.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentCategory {
    Dp,
    Lunas,
}

impl PaymentCategory {
    /// `Dp` while a positive balance remains, `Lunas` otherwise (including
    /// overpayment, where the remaining balance goes negative).
    pub fn from_remaining(remaining: Decimal) -> Self {
        if remaining > Decimal::ZERO {
            PaymentCategory::Dp
        } else {
            PaymentCategory::Lunas
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentCategory::Dp => "DP",
            PaymentCategory::Lunas => "LUNAS",
        }
    }
}

impl core::fmt::Display for PaymentCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issued invoice. Created exactly once per successful verification and
/// immutable thereafter; the ledger is append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub number: InvoiceNumber,
    pub registrant_id: RegistrantId,
    pub package_id: PackageId,
    pub room_type: RoomType,
    pub package_price: Decimal,
    /// Amount paid in this verification.
    pub payment_amount: Decimal,
    /// Cumulative amount paid. Equal to `payment_amount` today: a registrant
    /// is verified once, and follow-up installments live outside this
    /// workflow.
    pub total_paid: Decimal,
    /// Outstanding balance (`package_price - total_paid`). Negative when
    /// overpaid.
    pub remaining: Decimal,
    pub category: PaymentCategory,
    /// ISO-4217 currency code inherited from the package.
    pub currency: String,
    pub issued_at: DateTime<Utc>,
}

impl Invoice {
    /// Build the invoice for a verification.
    ///
    /// `remaining` is the raw difference `package_price - paid`; overpayment
    /// is accepted and yields a negative remaining balance with category
    /// `LUNAS`.
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        number: InvoiceNumber,
        registrant_id: RegistrantId,
        package_id: PackageId,
        room_type: RoomType,
        package_price: Decimal,
        paid: Decimal,
        currency: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if paid < Decimal::ZERO {
            return Err(DomainError::validation("paid amount must be non-negative"));
        }
        if package_price < Decimal::ZERO {
            return Err(DomainError::invariant("package price must be non-negative"));
        }

        let remaining = package_price - paid;

        Ok(Self {
            number,
            registrant_id,
            package_id,
            room_type,
            package_price,
            payment_amount: paid,
            total_paid: paid,
            remaining,
            category: PaymentCategory::from_remaining(remaining),
            currency: currency.into(),
            issued_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_number() -> InvoiceNumber {
        InvoiceNumber::new(2024, 13).unwrap()
    }

    fn test_registrant_id() -> RegistrantId {
        "3174012345678901".parse().unwrap()
    }

    fn issue(paid: Decimal) -> Invoice {
        Invoice::issue(
            test_number(),
            test_registrant_id(),
            PackageId::new(),
            RoomType::Quad,
            Decimal::from(15_000_000),
            paid,
            "IDR",
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn partial_payment_is_dp_with_remaining_balance() {
        let invoice = issue(Decimal::from(5_000_000));
        assert_eq!(invoice.payment_amount, Decimal::from(5_000_000));
        assert_eq!(invoice.remaining, Decimal::from(10_000_000));
        assert_eq!(invoice.category, PaymentCategory::Dp);
    }

    #[test]
    fn exact_payment_is_lunas_with_zero_remaining() {
        let invoice = issue(Decimal::from(15_000_000));
        assert_eq!(invoice.remaining, Decimal::ZERO);
        assert_eq!(invoice.category, PaymentCategory::Lunas);
    }

    #[test]
    fn overpayment_is_lunas_with_negative_remaining() {
        let invoice = issue(Decimal::from(15_500_000));
        assert_eq!(invoice.remaining, Decimal::from(-500_000));
        assert_eq!(invoice.category, PaymentCategory::Lunas);
    }

    #[test]
    fn negative_paid_amount_is_rejected() {
        let err = Invoice::issue(
            test_number(),
            test_registrant_id(),
            PackageId::new(),
            RoomType::Quad,
            Decimal::from(15_000_000),
            Decimal::from(-1),
            "IDR",
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn category_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&PaymentCategory::Lunas).unwrap(),
            "\"LUNAS\""
        );
        assert_eq!(serde_json::to_string(&PaymentCategory::Dp).unwrap(), "\"DP\"");
    }
}
