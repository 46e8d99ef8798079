#[tokio::main]
async fn main() {
    rihla_observability::init();

    let app = rihla_api::app::build_app()
        .await
        .expect("failed to build application");

    let bind = std::env::var("RIHLA_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
