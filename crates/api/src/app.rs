use std::sync::Arc;

use axum::extract::Extension;
use axum::routing::get;
use axum::Router;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the admin application: service wiring + routes.
pub async fn build_app() -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services().await?);
    Ok(router(services))
}

/// Assemble the router over already-built services (tests wire their own).
pub fn router(services: Arc<services::AppServices>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .nest("/registrants", routes::registrants::router())
        .layer(Extension(services))
}
