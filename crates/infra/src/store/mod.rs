//! Registration store: registrant records + the invoice ledger behind a
//! unit-of-work boundary.
//!
//! The store is deliberately small: the verification workflow is the only
//! writer. All writes go through a [`WorkUnit`] so the registrant update and
//! the invoice append commit or roll back together, and the coordinator can
//! keep the unit open until the notification dispatcher has confirmed the
//! send.

use async_trait::async_trait;
use thiserror::Error;

use rihla_core::{PackageId, RegistrantId};
use rihla_invoicing::Invoice;
use rihla_registrants::{Package, Registrant};

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryPackageCatalog, InMemoryStore};
pub use postgres::{PostgresPackageCatalog, PostgresStore};

/// Storage-layer error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated (e.g. an invoice number already
    /// exists). Retryable at the allocation level.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// A conditional write matched no rows because the record left the
    /// expected state (the status race was lost to a concurrent request).
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Any other backend failure (connection, serialization, constraint).
    #[error("storage failure: {0}")]
    Backend(String),
}

/// All-or-nothing scope over the registrant table and the invoice ledger.
///
/// Implementations must guarantee that nothing staged through a work unit is
/// visible to other requests before [`WorkUnit::commit`], and that dropping
/// an uncommitted unit discards everything (a caller timeout therefore
/// resolves to a full rollback server-side, never partial state).
#[async_trait]
pub trait WorkUnit: Send {
    /// Load the current registrant record, locked for the lifetime of this
    /// unit (Postgres: `SELECT .. FOR UPDATE`).
    async fn registrant(&mut self, id: &RegistrantId) -> Result<Option<Registrant>, StoreError>;

    /// Stage the `pending → verified` transition.
    ///
    /// The write is conditional on the stored status still being `pending`;
    /// implementations must report [`StoreError::StateConflict`] when the
    /// condition fails rather than applying a read-then-write.
    async fn store_verification(&mut self, registrant: &Registrant) -> Result<(), StoreError>;

    /// Stage the `pending → rejected` transition (same conditional-write
    /// contract as [`WorkUnit::store_verification`]).
    async fn store_rejection(&mut self, registrant: &Registrant) -> Result<(), StoreError>;

    /// Stage an append to the invoice ledger. The invoice number is unique;
    /// a collision surfaces as [`StoreError::DuplicateKey`] and must leave
    /// the unit usable so the caller can retry with a fresh number.
    async fn append_invoice(&mut self, invoice: &Invoice) -> Result<(), StoreError>;

    /// Make every staged write visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard every staged write.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Hands out unit-of-work scopes over the registration data.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn WorkUnit>, StoreError>;
}

/// Read-only price lookup for travel packages.
///
/// Packages are immutable during a verification; package management is a
/// separate back-office concern.
#[async_trait]
pub trait PackageCatalog: Send + Sync {
    async fn package(&self, id: &PackageId) -> Result<Option<Package>, StoreError>;
}
