//! `rihla-infra` — storage backends and the verification workflow.
//!
//! This crate composes the pure domain crates with infrastructure:
//! - `store`: the registration store (registrants + invoice ledger) behind a
//!   unit-of-work trait, with Postgres and in-memory backends;
//! - `sequence`: the per-year invoice number allocator;
//! - `receipt` / `notify`: boundary traits for the receipt generator and the
//!   notification dispatcher (their real implementations live outside this
//!   repository);
//! - `verification`: the coordinator that drives a verify/reject command
//!   through all of the above as a single all-or-nothing unit of work.

pub mod notify;
pub mod receipt;
pub mod sequence;
pub mod store;
pub mod verification;


pub use notify::{
    LoggingDispatcher, NotificationDispatcher, NotifyError, ReceiptAttachment,
    RecordingDispatcher, RejectionNotice, SentNotification, VerificationNotice,
};
pub use receipt::{ReceiptData, ReceiptError, ReceiptRenderer, TextReceiptRenderer};
pub use sequence::{InMemorySequenceAllocator, PostgresSequenceAllocator, SequenceAllocator};
pub use store::{
    InMemoryPackageCatalog, InMemoryStore, PackageCatalog, PostgresPackageCatalog, PostgresStore,
    RegistrationStore, StoreError, WorkUnit,
};
pub use verification::{
    RejectPayment, VerificationCoordinator, VerificationError, VerificationOutcome, VerifyPayment,
};
