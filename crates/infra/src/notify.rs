//! Notification dispatch boundary.
//!
//! The real dispatcher is an external mail service; the coordinator only
//! needs a fallible "send and confirm" seam. Dispatch failure must propagate
//! so the surrounding unit of work rolls back: the database never shows a
//! verification whose notification was not sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rihla_core::RegistrantId;
use rihla_invoicing::PaymentCategory;

#[derive(Debug, Error)]
#[error("notification dispatch failed: {0}")]
pub struct NotifyError(pub String);

/// Payload of the payment-confirmed email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationNotice {
    pub registrant_id: RegistrantId,
    pub registrant_name: String,
    pub program_name: String,
    pub amount_paid: Decimal,
    pub amount_remaining: Decimal,
    pub currency: String,
    pub category: PaymentCategory,
    pub verified_at: DateTime<Utc>,
}

/// Payload of the payment-rejected email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionNotice {
    pub registrant_id: RegistrantId,
    pub registrant_name: String,
    pub program_name: String,
    pub rejected_at: DateTime<Utc>,
}

/// Receipt document attached to the confirmation email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptAttachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Sends registrant-facing email. Must be treated as fallible: a send that
/// cannot be confirmed is an error, not a fire-and-forget.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_receipt(
        &self,
        recipient: &str,
        notice: &VerificationNotice,
        attachment: ReceiptAttachment,
    ) -> Result<(), NotifyError>;

    async fn send_rejection(
        &self,
        recipient: &str,
        notice: &RejectionNotice,
    ) -> Result<(), NotifyError>;
}

#[async_trait]
impl<T> NotificationDispatcher for Arc<T>
where
    T: NotificationDispatcher + ?Sized,
{
    async fn send_receipt(
        &self,
        recipient: &str,
        notice: &VerificationNotice,
        attachment: ReceiptAttachment,
    ) -> Result<(), NotifyError> {
        (**self).send_receipt(recipient, notice, attachment).await
    }

    async fn send_rejection(
        &self,
        recipient: &str,
        notice: &RejectionNotice,
    ) -> Result<(), NotifyError> {
        (**self).send_rejection(recipient, notice).await
    }
}

/// Stand-in dispatcher until the external mail service is wired: logs the
/// send at info level and reports success.
#[derive(Debug, Default, Clone)]
pub struct LoggingDispatcher;

impl LoggingDispatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn send_receipt(
        &self,
        recipient: &str,
        notice: &VerificationNotice,
        attachment: ReceiptAttachment,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            recipient,
            registrant = %notice.registrant_id,
            category = %notice.category,
            attachment = %attachment.filename,
            "confirmation email (logging dispatcher)"
        );
        Ok(())
    }

    async fn send_rejection(
        &self,
        recipient: &str,
        notice: &RejectionNotice,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            recipient,
            registrant = %notice.registrant_id,
            "rejection email (logging dispatcher)"
        );
        Ok(())
    }
}

/// A notification captured by [`RecordingDispatcher`].
#[derive(Debug, Clone)]
pub enum SentNotification {
    Receipt {
        recipient: String,
        notice: VerificationNotice,
        attachment_filename: String,
    },
    Rejection {
        recipient: String,
        notice: RejectionNotice,
    },
}

/// Dispatcher double for tests and dev wiring: records every send and can be
/// switched into a failing mode to exercise rollback paths.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `true`, every send fails with [`NotifyError`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().expect("lock poisoned").clone()
    }

    fn record(&self, notification: SentNotification) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError("dispatcher switched to failing mode".to_string()));
        }
        self.sent.lock().expect("lock poisoned").push(notification);
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send_receipt(
        &self,
        recipient: &str,
        notice: &VerificationNotice,
        attachment: ReceiptAttachment,
    ) -> Result<(), NotifyError> {
        self.record(SentNotification::Receipt {
            recipient: recipient.to_string(),
            notice: notice.clone(),
            attachment_filename: attachment.filename,
        })
    }

    async fn send_rejection(
        &self,
        recipient: &str,
        notice: &RejectionNotice,
    ) -> Result<(), NotifyError> {
        self.record(SentNotification::Rejection {
            recipient: recipient.to_string(),
            notice: notice.clone(),
        })
    }
}
