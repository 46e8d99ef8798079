//! Postgres-backed sequence allocator.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use super::SequenceAllocator;
use crate::store::StoreError;
use crate::store::postgres::map_sqlx_error;

/// Atomic counter over the `invoice_sequences` table.
///
/// The whole allocation is one upsert statement, serialized by the row lock
/// Postgres takes for the `DO UPDATE` arm. It runs on its own pooled
/// connection in auto-commit mode, outside the verification transaction, so
/// the increment survives even when the surrounding unit of work aborts.
#[derive(Debug, Clone)]
pub struct PostgresSequenceAllocator {
    pool: PgPool,
}

impl PostgresSequenceAllocator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SequenceAllocator for PostgresSequenceAllocator {
    #[instrument(skip(self))]
    async fn next(&self, year: i32) -> Result<u32, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO invoice_sequences (year, last_seq)
            VALUES ($1, 1)
            ON CONFLICT (year)
            DO UPDATE SET last_seq = invoice_sequences.last_seq + 1
            RETURNING last_seq
            "#,
        )
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("allocate_sequence", e))?;

        let last_seq: i32 = row
            .try_get("last_seq")
            .map_err(|e| StoreError::Backend(format!("invoice_sequences row: {e}")))?;
        u32::try_from(last_seq)
            .map_err(|_| StoreError::Backend(format!("negative sequence {last_seq} for {year}")))
    }
}
