//! Registrant records and the payment verification state machine.
//!
//! The only transitions this back office performs are
//! `pending → verified` and `pending → rejected`; both are terminal here.
//! A rejected registrant re-enters `pending` through a resubmission process
//! that lives outside this workflow.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rihla_core::{AdminId, DomainError, DomainResult, PackageId, RegistrantId};

use crate::package::RoomType;

/// Payment verification status of a registrant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Verified,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Verified => "verified",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

/// Result of a successful verification transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    /// Amount the registrant has paid.
    pub total: Decimal,
    /// Outstanding balance against the package price. May be negative when
    /// the registrant overpaid; the raw difference is kept so the credit
    /// stays visible.
    pub remaining: Decimal,
}

/// A person who submitted a travel registration and is awaiting or has
/// completed payment verification.
///
/// Invariants (upheld by the transition methods below):
/// - exactly one of `verified_at` / `rejected_at` is set once the status
///   leaves `Pending`;
/// - `payment_total` / `payment_remaining` are `Some` iff the status is
///   `Verified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registrant {
    pub id: RegistrantId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub package_id: PackageId,
    pub room_type: RoomType,
    pub payment_status: PaymentStatus,
    pub payment_total: Option<Decimal>,
    pub payment_remaining: Option<Decimal>,
    pub verified_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub verified_by: Option<AdminId>,
}

impl Registrant {
    /// A freshly submitted registration awaiting verification.
    #[allow(clippy::too_many_arguments)]
    pub fn new_pending(
        id: RegistrantId,
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
        package_id: PackageId,
        room_type: RoomType,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            address: address.into(),
            package_id,
            room_type,
            payment_status: PaymentStatus::Pending,
            payment_total: None,
            payment_remaining: None,
            verified_at: None,
            rejected_at: None,
            verified_by: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.payment_status == PaymentStatus::Pending
    }

    /// Transition `pending → verified`.
    ///
    /// Computes the outstanding balance against `package_price` and records
    /// who verified and when. Any prior rejection timestamp is cleared.
    /// Overpayment is accepted: `remaining` keeps the raw (negative)
    /// difference.
    pub fn verify(
        &mut self,
        package_price: Decimal,
        paid: Decimal,
        now: DateTime<Utc>,
        actor: AdminId,
    ) -> DomainResult<VerifiedPayment> {
        if paid < Decimal::ZERO {
            return Err(DomainError::validation("paid amount must be non-negative"));
        }
        if self.payment_status != PaymentStatus::Pending {
            return Err(DomainError::invalid_state(format!(
                "payment is already {}",
                self.payment_status.as_str()
            )));
        }

        let remaining = package_price - paid;

        self.payment_status = PaymentStatus::Verified;
        self.payment_total = Some(paid);
        self.payment_remaining = Some(remaining);
        self.verified_at = Some(now);
        self.verified_by = Some(actor);
        self.rejected_at = None;

        Ok(VerifiedPayment {
            total: paid,
            remaining,
        })
    }

    /// Transition `pending → rejected`.
    ///
    /// Clears all verification fields; only `rejected_at` survives.
    pub fn reject(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.payment_status != PaymentStatus::Pending {
            return Err(DomainError::invalid_state(format!(
                "payment is already {}",
                self.payment_status.as_str()
            )));
        }

        self.payment_status = PaymentStatus::Rejected;
        self.payment_total = None;
        self.payment_remaining = None;
        self.verified_at = None;
        self.verified_by = None;
        self.rejected_at = Some(now);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registrant() -> Registrant {
        Registrant::new_pending(
            "3174012345678901".parse().unwrap(),
            "Siti Aminah",
            "siti@example.com",
            "+62 812 3456 7890",
            "Jl. Kebon Jeruk 5, Jakarta",
            PackageId::new(),
            RoomType::Quad,
        )
    }

    fn price() -> Decimal {
        Decimal::from(15_000_000)
    }

    #[test]
    fn verify_sets_totals_and_audit_fields() {
        let mut r = test_registrant();
        let now = Utc::now();
        let actor = AdminId::new();

        let outcome = r.verify(price(), Decimal::from(5_000_000), now, actor).unwrap();

        assert_eq!(outcome.total, Decimal::from(5_000_000));
        assert_eq!(outcome.remaining, Decimal::from(10_000_000));
        assert_eq!(r.payment_status, PaymentStatus::Verified);
        assert_eq!(r.payment_total, Some(Decimal::from(5_000_000)));
        assert_eq!(r.payment_remaining, Some(Decimal::from(10_000_000)));
        assert_eq!(r.verified_at, Some(now));
        assert_eq!(r.verified_by, Some(actor));
        assert_eq!(r.rejected_at, None);
    }

    #[test]
    fn verify_rejects_negative_amount() {
        let mut r = test_registrant();
        let err = r
            .verify(price(), Decimal::from(-1), Utc::now(), AdminId::new())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(r.is_pending());
    }

    #[test]
    fn verify_twice_fails_with_invalid_state() {
        let mut r = test_registrant();
        r.verify(price(), Decimal::from(5_000_000), Utc::now(), AdminId::new())
            .unwrap();

        let err = r
            .verify(price(), Decimal::from(5_000_000), Utc::now(), AdminId::new())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn verify_accepts_overpayment_with_negative_remaining() {
        let mut r = test_registrant();
        let outcome = r
            .verify(price(), Decimal::from(16_000_000), Utc::now(), AdminId::new())
            .unwrap();
        assert_eq!(outcome.remaining, Decimal::from(-1_000_000));
    }

    #[test]
    fn reject_clears_verification_fields() {
        let mut r = test_registrant();
        let now = Utc::now();

        r.reject(now).unwrap();

        assert_eq!(r.payment_status, PaymentStatus::Rejected);
        assert_eq!(r.payment_total, None);
        assert_eq!(r.payment_remaining, None);
        assert_eq!(r.verified_at, None);
        assert_eq!(r.verified_by, None);
        assert_eq!(r.rejected_at, Some(now));
    }

    #[test]
    fn reject_after_verify_fails() {
        let mut r = test_registrant();
        r.verify(price(), price(), Utc::now(), AdminId::new()).unwrap();

        let err = r.reject(Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn verify_after_reject_fails() {
        let mut r = test_registrant();
        r.reject(Utc::now()).unwrap();

        let err = r
            .verify(price(), price(), Utc::now(), AdminId::new())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }
}
