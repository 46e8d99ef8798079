//! In-memory registration store.
//!
//! Intended for tests/dev. Writes are staged in the work unit and applied on
//! commit; a per-registrant async lock is held from the first load until
//! commit/rollback, mirroring the row lock the Postgres backend takes with
//! `SELECT .. FOR UPDATE`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use rihla_core::{PackageId, RegistrantId};
use rihla_invoicing::Invoice;
use rihla_registrants::{Package, PaymentStatus, Registrant};

use super::{PackageCatalog, RegistrationStore, StoreError, WorkUnit};

#[derive(Debug, Default)]
struct Tables {
    registrants: HashMap<RegistrantId, Registrant>,
    invoices: BTreeMap<String, Invoice>,
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory [`RegistrationStore`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    row_locks: Arc<StdMutex<HashMap<RegistrantId, Arc<AsyncMutex<()>>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a registrant (registration submission is out of scope, tests and
    /// dev wiring insert records directly).
    pub fn insert_registrant(&self, registrant: Registrant) {
        self.tables
            .write()
            .expect("lock poisoned")
            .registrants
            .insert(registrant.id.clone(), registrant);
    }

    /// Seed an invoice (e.g. a number issued before this system took over).
    pub fn insert_invoice(&self, invoice: Invoice) {
        self.tables
            .write()
            .expect("lock poisoned")
            .invoices
            .insert(invoice.number.to_string(), invoice);
    }

    /// Committed registrant state, if any.
    pub fn registrant(&self, id: &RegistrantId) -> Option<Registrant> {
        self.tables
            .read()
            .expect("lock poisoned")
            .registrants
            .get(id)
            .cloned()
    }

    /// All committed invoices, in invoice-number order.
    pub fn invoices(&self) -> Vec<Invoice> {
        self.tables
            .read()
            .expect("lock poisoned")
            .invoices
            .values()
            .cloned()
            .collect()
    }

    fn row_lock(&self, id: &RegistrantId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.row_locks.lock().expect("lock poisoned");
        locks.entry(id.clone()).or_default().clone()
    }
}

#[async_trait]
impl RegistrationStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn WorkUnit>, StoreError> {
        Ok(Box::new(InMemoryWorkUnit {
            store: self.clone(),
            locked: None,
            staged_registrant: None,
            staged_invoices: Vec::new(),
        }))
    }
}

struct InMemoryWorkUnit {
    store: InMemoryStore,
    /// Held from the first registrant load until commit/rollback/drop.
    locked: Option<(RegistrantId, OwnedMutexGuard<()>)>,
    staged_registrant: Option<Registrant>,
    staged_invoices: Vec<Invoice>,
}

impl InMemoryWorkUnit {
    fn committed_status(&self, id: &RegistrantId) -> Result<Option<PaymentStatus>, StoreError> {
        let tables = self.store.tables.read().map_err(|_| poisoned())?;
        Ok(tables.registrants.get(id).map(|r| r.payment_status))
    }
}

#[async_trait]
impl WorkUnit for InMemoryWorkUnit {
    async fn registrant(&mut self, id: &RegistrantId) -> Result<Option<Registrant>, StoreError> {
        let already_locked = matches!(&self.locked, Some((held, _)) if held == id);
        if !already_locked {
            // Emulates FOR UPDATE: a concurrent unit holding this registrant
            // blocks us until it commits or rolls back.
            let lock = self.store.row_lock(id);
            let guard = lock.lock_owned().await;
            self.locked = Some((id.clone(), guard));
        }

        let tables = self.store.tables.read().map_err(|_| poisoned())?;
        Ok(tables.registrants.get(id).cloned())
    }

    async fn store_verification(&mut self, registrant: &Registrant) -> Result<(), StoreError> {
        match self.committed_status(&registrant.id)? {
            Some(PaymentStatus::Pending) => {
                self.staged_registrant = Some(registrant.clone());
                Ok(())
            }
            _ => Err(StoreError::StateConflict(format!(
                "registrant {} is no longer pending",
                registrant.id
            ))),
        }
    }

    async fn store_rejection(&mut self, registrant: &Registrant) -> Result<(), StoreError> {
        match self.committed_status(&registrant.id)? {
            Some(PaymentStatus::Pending) => {
                self.staged_registrant = Some(registrant.clone());
                Ok(())
            }
            _ => Err(StoreError::StateConflict(format!(
                "registrant {} is no longer pending",
                registrant.id
            ))),
        }
    }

    async fn append_invoice(&mut self, invoice: &Invoice) -> Result<(), StoreError> {
        let key = invoice.number.to_string();
        let committed = {
            let tables = self.store.tables.read().map_err(|_| poisoned())?;
            tables.invoices.contains_key(&key)
        };
        let staged = self
            .staged_invoices
            .iter()
            .any(|i| i.number == invoice.number);
        if committed || staged {
            return Err(StoreError::DuplicateKey(format!(
                "invoice number {} already issued",
                invoice.number
            )));
        }
        self.staged_invoices.push(invoice.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tables = self.store.tables.write().map_err(|_| poisoned())?;
        for invoice in &self.staged_invoices {
            if tables.invoices.contains_key(&invoice.number.to_string()) {
                return Err(StoreError::DuplicateKey(format!(
                    "invoice number {} already issued",
                    invoice.number
                )));
            }
        }
        if let Some(registrant) = self.staged_registrant {
            tables
                .registrants
                .insert(registrant.id.clone(), registrant);
        }
        for invoice in self.staged_invoices {
            tables.invoices.insert(invoice.number.to_string(), invoice);
        }
        Ok(())
        // `self.locked` guard drops here, releasing the row.
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Staged writes and the row lock are discarded with `self`.
        Ok(())
    }
}

/// In-memory [`PackageCatalog`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryPackageCatalog {
    packages: Arc<RwLock<HashMap<PackageId, Package>>>,
}

impl InMemoryPackageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, package: Package) {
        self.packages
            .write()
            .expect("lock poisoned")
            .insert(package.id, package);
    }
}

#[async_trait]
impl PackageCatalog for InMemoryPackageCatalog {
    async fn package(&self, id: &PackageId) -> Result<Option<Package>, StoreError> {
        let packages = self.packages.read().map_err(|_| poisoned())?;
        Ok(packages.get(id).cloned())
    }
}
