//! Payment verification workflow.
//!
//! The coordinator drives an admin's verify/reject command through the
//! registration store, the sequence allocator, the receipt renderer, and the
//! notification dispatcher as one all-or-nothing unit of work. The data
//! writes are staged first, the notification is dispatched while the unit is
//! still open, and the unit commits only after the dispatcher confirms the
//! send, so the store never shows `verified` without a sent notification.
//! A process crash between send and commit can deliver an email for a
//! verification that never committed; that direction is accepted (see
//! DESIGN.md) and would take a durable outbox to close.

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use rihla_core::{AdminId, DomainError, RegistrantId};
use rihla_invoicing::{Invoice, InvoiceNumber};

use crate::notify::{
    NotificationDispatcher, ReceiptAttachment, RejectionNotice, VerificationNotice,
};
use crate::receipt::{ReceiptData, ReceiptRenderer};
use crate::sequence::SequenceAllocator;
use crate::store::{PackageCatalog, RegistrationStore, StoreError, WorkUnit};

/// Attempts at allocate-and-append before a number conflict is treated as a
/// persistent failure.
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 3;

/// Workflow-level error taxonomy.
///
/// `AllocationConflict` is retried internally and only reaches callers
/// through the storage traits; the coordinator surfaces exhausted retries
/// as `Persistence`.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("registrant not found")]
    NotFound,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invoice number allocation conflict: {0}")]
    AllocationConflict(String),

    /// The notification could not be confirmed sent; the data writes were
    /// rolled back.
    #[error("notification dispatch failed: {0}")]
    Notification(String),

    /// A write or commit failed; the registrant's state is whatever the
    /// storage backend resolved the transaction to (complete rollback).
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<DomainError> for VerificationError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::NotFound => Self::NotFound,
            DomainError::InvalidState(msg) => Self::InvalidState(msg),
            DomainError::Validation(msg)
            | DomainError::InvalidId(msg)
            | DomainError::InvariantViolation(msg) => Self::Validation(msg),
        }
    }
}

impl From<StoreError> for VerificationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateKey(msg) => Self::AllocationConflict(msg),
            StoreError::StateConflict(msg) => Self::InvalidState(msg),
            StoreError::Backend(msg) => Self::Persistence(msg),
        }
    }
}

/// Command: verify a pending payment of `paid_amount`.
#[derive(Debug, Clone)]
pub struct VerifyPayment {
    pub registrant_id: RegistrantId,
    pub paid_amount: Decimal,
    /// How the money arrived (printed on the receipt), if the admin recorded it.
    pub payment_method: Option<String>,
    pub actor: AdminId,
}

/// Command: reject a pending payment.
#[derive(Debug, Clone)]
pub struct RejectPayment {
    pub registrant_id: RegistrantId,
    pub actor: AdminId,
}

/// What a successful verification returns to the admin surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub invoice_number: InvoiceNumber,
    pub remaining: Decimal,
}

/// Orchestrates the verification workflow over injected backends.
///
/// Generic over the storage and boundary traits so tests run against the
/// in-memory implementations and production wires Postgres plus the real
/// mail service.
#[derive(Debug)]
pub struct VerificationCoordinator<S, A, C, R, N> {
    store: S,
    allocator: A,
    catalog: C,
    renderer: R,
    dispatcher: N,
}

impl<S, A, C, R, N> VerificationCoordinator<S, A, C, R, N> {
    pub fn new(store: S, allocator: A, catalog: C, renderer: R, dispatcher: N) -> Self {
        Self {
            store,
            allocator,
            catalog,
            renderer,
            dispatcher,
        }
    }
}

/// Log the failed step with its cause, roll the unit back, and hand the
/// error back for propagation.
async fn abort(
    work: Box<dyn WorkUnit>,
    registrant_id: &RegistrantId,
    step: &'static str,
    error: VerificationError,
) -> VerificationError {
    tracing::error!(
        registrant = %registrant_id,
        step,
        error = %error,
        "verification step failed, rolling back"
    );
    if let Err(rollback_err) = work.rollback().await {
        tracing::error!(
            registrant = %registrant_id,
            error = %rollback_err,
            "rollback failed"
        );
    }
    error
}

impl<S, A, C, R, N> VerificationCoordinator<S, A, C, R, N>
where
    S: RegistrationStore,
    A: SequenceAllocator,
    C: PackageCatalog,
    R: ReceiptRenderer,
    N: NotificationDispatcher,
{
    /// Verify a pending payment.
    ///
    /// Order of operations: load + status check, price resolution, domain
    /// transition, number allocation (durable, outside the unit), invoice
    /// append, conditional registrant update, receipt render, notification
    /// dispatch, commit. Any failure after `begin` rolls the unit back.
    #[instrument(skip(self, cmd), fields(registrant = %cmd.registrant_id, actor = %cmd.actor))]
    pub async fn verify_payment(
        &self,
        cmd: VerifyPayment,
    ) -> Result<VerificationOutcome, VerificationError> {
        if cmd.paid_amount < Decimal::ZERO {
            return Err(VerificationError::Validation(
                "paid amount must be a non-negative decimal".to_string(),
            ));
        }

        let mut work = self.store.begin().await.map_err(|e| {
            tracing::error!(registrant = %cmd.registrant_id, error = %e, "could not open unit of work");
            VerificationError::Persistence(e.to_string())
        })?;

        let mut registrant = match work.registrant(&cmd.registrant_id).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                return Err(abort(
                    work,
                    &cmd.registrant_id,
                    "load_registrant",
                    VerificationError::NotFound,
                )
                .await);
            }
            Err(e) => {
                return Err(abort(work, &cmd.registrant_id, "load_registrant", e.into()).await);
            }
        };

        let package = match self.catalog.package(&registrant.package_id).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                return Err(abort(
                    work,
                    &cmd.registrant_id,
                    "resolve_package",
                    VerificationError::Validation(format!(
                        "unknown package {}",
                        registrant.package_id
                    )),
                )
                .await);
            }
            Err(e) => {
                return Err(abort(work, &cmd.registrant_id, "resolve_package", e.into()).await);
            }
        };
        let Some(price) = package.price_for(registrant.room_type) else {
            return Err(abort(
                work,
                &cmd.registrant_id,
                "resolve_package",
                VerificationError::Validation(format!(
                    "package {} has no {} price",
                    registrant.package_id, registrant.room_type
                )),
            )
            .await);
        };

        let now = Utc::now();
        let verified = match registrant.verify(price, cmd.paid_amount, now, cmd.actor) {
            Ok(v) => v,
            Err(e) => {
                return Err(abort(work, &cmd.registrant_id, "apply_verification", e.into()).await);
            }
        };

        // Allocate a number and append the invoice. The allocator is durable
        // outside the unit, so a lost race only costs a gap; a ledger
        // collision (pre-seeded numbers) gets a bounded retry with a fresh
        // number.
        let year = now.year();
        let mut attempt = 0u32;
        let invoice = loop {
            attempt += 1;

            let sequence = match self.allocator.next(year).await {
                Ok(s) => s,
                Err(e) => {
                    return Err(
                        abort(work, &cmd.registrant_id, "allocate_sequence", e.into()).await
                    );
                }
            };
            let number = match InvoiceNumber::new(year, sequence) {
                Ok(n) => n,
                Err(e) => {
                    return Err(
                        abort(work, &cmd.registrant_id, "allocate_sequence", e.into()).await
                    );
                }
            };
            let candidate = match Invoice::issue(
                number,
                registrant.id.clone(),
                registrant.package_id,
                registrant.room_type,
                price,
                cmd.paid_amount,
                package.currency.clone(),
                now,
            ) {
                Ok(i) => i,
                Err(e) => {
                    return Err(abort(work, &cmd.registrant_id, "issue_invoice", e.into()).await);
                }
            };

            match work.append_invoice(&candidate).await {
                Ok(()) => break candidate,
                Err(StoreError::DuplicateKey(_)) if attempt < MAX_ALLOCATION_ATTEMPTS => {
                    tracing::warn!(
                        registrant = %cmd.registrant_id,
                        invoice_number = %number,
                        attempt,
                        "invoice number collision, reallocating"
                    );
                }
                Err(StoreError::DuplicateKey(msg)) => {
                    return Err(abort(
                        work,
                        &cmd.registrant_id,
                        "append_invoice",
                        VerificationError::Persistence(format!(
                            "allocation conflict persisted after {MAX_ALLOCATION_ATTEMPTS} attempts: {msg}"
                        )),
                    )
                    .await);
                }
                Err(e) => {
                    return Err(abort(work, &cmd.registrant_id, "append_invoice", e.into()).await);
                }
            }
        };

        if let Err(e) = work.store_verification(&registrant).await {
            return Err(abort(work, &cmd.registrant_id, "store_verification", e.into()).await);
        }

        let receipt = ReceiptData::assemble(
            &invoice,
            &registrant,
            package.program_name.clone(),
            cmd.payment_method.clone(),
        );
        let receipt_bytes = match self.renderer.render(&receipt) {
            Ok(b) => b,
            Err(e) => {
                return Err(abort(
                    work,
                    &cmd.registrant_id,
                    "render_receipt",
                    VerificationError::Notification(e.to_string()),
                )
                .await);
            }
        };

        let notice = VerificationNotice {
            registrant_id: registrant.id.clone(),
            registrant_name: registrant.name.clone(),
            program_name: package.program_name.clone(),
            amount_paid: invoice.payment_amount,
            amount_remaining: invoice.remaining,
            currency: invoice.currency.clone(),
            category: invoice.category,
            verified_at: now,
        };
        let attachment = ReceiptAttachment {
            filename: format!("receipt-{}.txt", invoice.number),
            bytes: receipt_bytes,
        };
        if let Err(e) = self
            .dispatcher
            .send_receipt(&registrant.email, &notice, attachment)
            .await
        {
            return Err(abort(
                work,
                &cmd.registrant_id,
                "dispatch_notification",
                VerificationError::Notification(e.to_string()),
            )
            .await);
        }

        if let Err(e) = work.commit().await {
            tracing::error!(
                registrant = %cmd.registrant_id,
                step = "commit",
                error = %e,
                "verification commit failed"
            );
            return Err(VerificationError::Persistence(e.to_string()));
        }

        tracing::info!(
            registrant = %cmd.registrant_id,
            invoice_number = %invoice.number,
            remaining = %verified.remaining,
            category = %invoice.category,
            "payment verified"
        );

        Ok(VerificationOutcome {
            invoice_number: invoice.number,
            remaining: verified.remaining,
        })
    }

    /// Reject a pending payment.
    ///
    /// Same unit-of-work coupling as verification: the rejection notice must
    /// be confirmed sent before the status write commits.
    #[instrument(skip(self, cmd), fields(registrant = %cmd.registrant_id, actor = %cmd.actor))]
    pub async fn reject_payment(&self, cmd: RejectPayment) -> Result<(), VerificationError> {
        let mut work = self.store.begin().await.map_err(|e| {
            tracing::error!(registrant = %cmd.registrant_id, error = %e, "could not open unit of work");
            VerificationError::Persistence(e.to_string())
        })?;

        let mut registrant = match work.registrant(&cmd.registrant_id).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                return Err(abort(
                    work,
                    &cmd.registrant_id,
                    "load_registrant",
                    VerificationError::NotFound,
                )
                .await);
            }
            Err(e) => {
                return Err(abort(work, &cmd.registrant_id, "load_registrant", e.into()).await);
            }
        };

        let package = match self.catalog.package(&registrant.package_id).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                return Err(abort(
                    work,
                    &cmd.registrant_id,
                    "resolve_package",
                    VerificationError::Validation(format!(
                        "unknown package {}",
                        registrant.package_id
                    )),
                )
                .await);
            }
            Err(e) => {
                return Err(abort(work, &cmd.registrant_id, "resolve_package", e.into()).await);
            }
        };

        let now = Utc::now();
        if let Err(e) = registrant.reject(now) {
            return Err(abort(work, &cmd.registrant_id, "apply_rejection", e.into()).await);
        }

        if let Err(e) = work.store_rejection(&registrant).await {
            return Err(abort(work, &cmd.registrant_id, "store_rejection", e.into()).await);
        }

        let notice = RejectionNotice {
            registrant_id: registrant.id.clone(),
            registrant_name: registrant.name.clone(),
            program_name: package.program_name.clone(),
            rejected_at: now,
        };
        if let Err(e) = self
            .dispatcher
            .send_rejection(&registrant.email, &notice)
            .await
        {
            return Err(abort(
                work,
                &cmd.registrant_id,
                "dispatch_notification",
                VerificationError::Notification(e.to_string()),
            )
            .await);
        }

        if let Err(e) = work.commit().await {
            tracing::error!(
                registrant = %cmd.registrant_id,
                step = "commit",
                error = %e,
                "rejection commit failed"
            );
            return Err(VerificationError::Persistence(e.to_string()));
        }

        tracing::info!(registrant = %cmd.registrant_id, "payment rejected");
        Ok(())
    }
}
