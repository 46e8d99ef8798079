//! Postgres-backed registration store.
//!
//! One [`PostgresWorkUnit`] owns one `sqlx` transaction. The registrant row
//! is taken with `SELECT .. FOR UPDATE`, status transitions are conditional
//! updates (`WHERE payment_status = 'pending'`), and the invoice append runs
//! under a savepoint so a number collision does not poison the enclosing
//! transaction. Unique violations (SQLSTATE 23505) map to
//! [`StoreError::DuplicateKey`]; a conditional update matching zero rows maps
//! to [`StoreError::StateConflict`].

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Acquire, FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use rihla_core::{AdminId, PackageId, RegistrantId};
use rihla_invoicing::Invoice;
use rihla_registrants::{Package, PaymentStatus, Registrant, RoomType};

use super::{PackageCatalog, RegistrationStore, StoreError, WorkUnit};

pub(crate) fn map_sqlx_error(operation: &str, e: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("{operation}: {e}"))
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// Postgres-backed [`RegistrationStore`].
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the schema migrations bundled with this crate.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migrate: {e}")))
    }
}

#[async_trait]
impl RegistrationStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn WorkUnit>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresWorkUnit { tx }))
    }
}

/// One open transaction over registrants + invoices.
pub struct PostgresWorkUnit {
    tx: Transaction<'static, Postgres>,
}

#[derive(FromRow)]
struct RegistrantRow {
    id: String,
    name: String,
    email: String,
    phone: String,
    address: String,
    package_id: Uuid,
    room_type: String,
    payment_status: String,
    payment_total: Option<Decimal>,
    payment_remaining: Option<Decimal>,
    verified_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
    verified_by: Option<Uuid>,
}

impl RegistrantRow {
    fn into_domain(self) -> Result<Registrant, StoreError> {
        let status = match self.payment_status.as_str() {
            "pending" => PaymentStatus::Pending,
            "verified" => PaymentStatus::Verified,
            "rejected" => PaymentStatus::Rejected,
            other => {
                return Err(StoreError::Backend(format!(
                    "unknown payment_status '{other}' in registrants row"
                )));
            }
        };
        Ok(Registrant {
            id: RegistrantId::from_str(&self.id)
                .map_err(|e| StoreError::Backend(format!("registrant id column: {e}")))?,
            name: self.name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            package_id: PackageId::from_uuid(self.package_id),
            room_type: RoomType::from_str(&self.room_type)
                .map_err(|e| StoreError::Backend(format!("room_type column: {e}")))?,
            payment_status: status,
            payment_total: self.payment_total,
            payment_remaining: self.payment_remaining,
            verified_at: self.verified_at,
            rejected_at: self.rejected_at,
            verified_by: self.verified_by.map(AdminId::from_uuid),
        })
    }
}

#[async_trait]
impl WorkUnit for PostgresWorkUnit {
    #[instrument(skip(self), fields(registrant = %id))]
    async fn registrant(&mut self, id: &RegistrantId) -> Result<Option<Registrant>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                id,
                name,
                email,
                phone,
                address,
                package_id,
                room_type,
                payment_status,
                payment_total,
                payment_remaining,
                verified_at,
                rejected_at,
                verified_by
            FROM registrants
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_registrant", e))?;

        match row {
            Some(row) => {
                let parsed = RegistrantRow::from_row(&row)
                    .map_err(|e| StoreError::Backend(format!("registrant row: {e}")))?;
                Ok(Some(parsed.into_domain()?))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, registrant), fields(registrant = %registrant.id))]
    async fn store_verification(&mut self, registrant: &Registrant) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE registrants
            SET payment_status = 'verified',
                payment_total = $2,
                payment_remaining = $3,
                verified_at = $4,
                verified_by = $5,
                rejected_at = NULL
            WHERE id = $1 AND payment_status = 'pending'
            "#,
        )
        .bind(registrant.id.as_str())
        .bind(registrant.payment_total)
        .bind(registrant.payment_remaining)
        .bind(registrant.verified_at)
        .bind(registrant.verified_by.map(|a| *a.as_uuid()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("store_verification", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StateConflict(format!(
                "registrant {} is no longer pending",
                registrant.id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, registrant), fields(registrant = %registrant.id))]
    async fn store_rejection(&mut self, registrant: &Registrant) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE registrants
            SET payment_status = 'rejected',
                payment_total = NULL,
                payment_remaining = NULL,
                verified_at = NULL,
                verified_by = NULL,
                rejected_at = $2
            WHERE id = $1 AND payment_status = 'pending'
            "#,
        )
        .bind(registrant.id.as_str())
        .bind(registrant.rejected_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("store_rejection", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StateConflict(format!(
                "registrant {} is no longer pending",
                registrant.id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.number))]
    async fn append_invoice(&mut self, invoice: &Invoice) -> Result<(), StoreError> {
        // Savepoint: a failed insert must leave the outer transaction usable
        // so the coordinator can retry with a freshly allocated number.
        let mut sp = self
            .tx
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_savepoint", e))?;

        let result = sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_number,
                registrant_id,
                package_id,
                room_type,
                package_price,
                payment_amount,
                total_paid,
                remaining,
                category,
                currency,
                issued_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(invoice.number.to_string())
        .bind(invoice.registrant_id.as_str())
        .bind(invoice.package_id.as_uuid())
        .bind(invoice.room_type.as_str())
        .bind(invoice.package_price)
        .bind(invoice.payment_amount)
        .bind(invoice.total_paid)
        .bind(invoice.remaining)
        .bind(invoice.category.as_str())
        .bind(&invoice.currency)
        .bind(invoice.issued_at)
        .execute(&mut *sp)
        .await;

        match result {
            Ok(_) => sp
                .commit()
                .await
                .map_err(|e| map_sqlx_error("release_savepoint", e)),
            Err(e) if is_unique_violation(&e) => {
                let _ = sp.rollback().await;
                Err(StoreError::DuplicateKey(format!(
                    "invoice number {} already issued",
                    invoice.number
                )))
            }
            Err(e) => {
                let _ = sp.rollback().await;
                Err(map_sqlx_error("append_invoice", e))
            }
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback_transaction", e))
    }
}

/// Postgres-backed [`PackageCatalog`].
#[derive(Debug, Clone)]
pub struct PostgresPackageCatalog {
    pool: PgPool,
}

impl PostgresPackageCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PackageCatalog for PostgresPackageCatalog {
    #[instrument(skip(self), fields(package = %id))]
    async fn package(&self, id: &PackageId) -> Result<Option<Package>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT program_name, currency
            FROM packages
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_package", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let program_name: String = row
            .try_get("program_name")
            .map_err(|e| StoreError::Backend(format!("package row: {e}")))?;
        let currency: String = row
            .try_get("currency")
            .map_err(|e| StoreError::Backend(format!("package row: {e}")))?;

        let price_rows = sqlx::query(
            r#"
            SELECT room_type, base_price
            FROM package_prices
            WHERE package_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_package_prices", e))?;

        let mut prices = BTreeMap::new();
        for price_row in price_rows {
            let room_type: String = price_row
                .try_get("room_type")
                .map_err(|e| StoreError::Backend(format!("package_prices row: {e}")))?;
            let base_price: Decimal = price_row
                .try_get("base_price")
                .map_err(|e| StoreError::Backend(format!("package_prices row: {e}")))?;
            let room_type = RoomType::from_str(&room_type)
                .map_err(|e| StoreError::Backend(format!("room_type column: {e}")))?;
            prices.insert(room_type, base_price);
        }

        Ok(Some(Package {
            id: *id,
            program_name,
            prices,
            currency,
        }))
    }
}
