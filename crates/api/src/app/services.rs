use std::sync::Arc;

use sqlx::PgPool;

use rihla_infra::{
    InMemoryPackageCatalog, InMemorySequenceAllocator, InMemoryStore, LoggingDispatcher,
    PostgresPackageCatalog, PostgresSequenceAllocator, PostgresStore, RecordingDispatcher,
    RejectPayment, TextReceiptRenderer, VerificationCoordinator, VerificationError,
    VerificationOutcome, VerifyPayment,
};

/// Coordinator over the in-memory backends (dev/test). Tests inspect the
/// recording dispatcher; dev wiring just ignores it.
pub type InMemoryCoordinator = VerificationCoordinator<
    InMemoryStore,
    InMemorySequenceAllocator,
    InMemoryPackageCatalog,
    TextReceiptRenderer,
    Arc<RecordingDispatcher>,
>;

/// Coordinator over Postgres. The notification dispatcher is the logging
/// stand-in until the external mail service is wired.
pub type PostgresCoordinator = VerificationCoordinator<
    PostgresStore,
    PostgresSequenceAllocator,
    PostgresPackageCatalog,
    TextReceiptRenderer,
    LoggingDispatcher,
>;

#[derive(Clone)]
pub enum AppServices {
    InMemory {
        coordinator: Arc<InMemoryCoordinator>,
        store: InMemoryStore,
        catalog: InMemoryPackageCatalog,
        dispatcher: Arc<RecordingDispatcher>,
    },
    Postgres {
        coordinator: Arc<PostgresCoordinator>,
    },
}

impl AppServices {
    pub async fn verify_payment(
        &self,
        cmd: VerifyPayment,
    ) -> Result<VerificationOutcome, VerificationError> {
        match self {
            AppServices::InMemory { coordinator, .. } => coordinator.verify_payment(cmd).await,
            AppServices::Postgres { coordinator } => coordinator.verify_payment(cmd).await,
        }
    }

    pub async fn reject_payment(&self, cmd: RejectPayment) -> Result<(), VerificationError> {
        match self {
            AppServices::InMemory { coordinator, .. } => coordinator.reject_payment(cmd).await,
            AppServices::Postgres { coordinator } => coordinator.reject_payment(cmd).await,
        }
    }
}

/// Wire services from the environment: Postgres when `DATABASE_URL` is set,
/// in-memory otherwise.
pub async fn build_services() -> anyhow::Result<AppServices> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => build_postgres_services(&url).await,
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            Ok(build_in_memory_services())
        }
    }
}

pub fn build_in_memory_services() -> AppServices {
    let store = InMemoryStore::new();
    let catalog = InMemoryPackageCatalog::new();
    let dispatcher = Arc::new(RecordingDispatcher::new());

    let coordinator = Arc::new(VerificationCoordinator::new(
        store.clone(),
        InMemorySequenceAllocator::new(),
        catalog.clone(),
        TextReceiptRenderer::new(),
        dispatcher.clone(),
    ));

    AppServices::InMemory {
        coordinator,
        store,
        catalog,
        dispatcher,
    }
}

async fn build_postgres_services(url: &str) -> anyhow::Result<AppServices> {
    let pool = PgPool::connect(url).await?;

    let store = PostgresStore::new(pool.clone());
    store.run_migrations().await?;

    let coordinator = Arc::new(VerificationCoordinator::new(
        store,
        PostgresSequenceAllocator::new(pool.clone()),
        PostgresPackageCatalog::new(pool),
        TextReceiptRenderer::new(),
        LoggingDispatcher::new(),
    ));

    Ok(AppServices::Postgres { coordinator })
}
