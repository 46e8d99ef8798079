//! Black-box tests against the real HTTP server on an ephemeral port.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use rihla_api::app::services::{AppServices, build_in_memory_services};
use rihla_core::{AdminId, PackageId, RegistrantId};
use rihla_infra::{InMemoryStore, RecordingDispatcher};
use rihla_registrants::{Package, PaymentStatus, Registrant, RoomType};

struct TestServer {
    base_url: String,
    store: InMemoryStore,
    dispatcher: Arc<RecordingDispatcher>,
    registrant_id: RegistrantId,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Same router as prod over seeded in-memory services, bound to an
    /// ephemeral port.
    async fn spawn() -> Self {
        let services = build_in_memory_services();
        let AppServices::InMemory {
            store,
            catalog,
            dispatcher,
            ..
        } = &services
        else {
            unreachable!("in-memory wiring")
        };

        let package_id = PackageId::new();
        let mut prices = BTreeMap::new();
        prices.insert(RoomType::Quad, Decimal::from(15_000_000));
        catalog.insert(Package {
            id: package_id,
            program_name: "Umrah Ramadhan 12 Hari".to_string(),
            prices,
            currency: "IDR".to_string(),
        });

        let registrant_id: RegistrantId = "3174012345678901".parse().unwrap();
        store.insert_registrant(Registrant::new_pending(
            registrant_id.clone(),
            "Siti Aminah",
            "siti@example.com",
            "+62 812 3456 7890",
            "Jl. Kebon Jeruk 5, Jakarta",
            package_id,
            RoomType::Quad,
        ));

        let store = store.clone();
        let dispatcher = dispatcher.clone();
        let app = rihla_api::app::router(Arc::new(services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            dispatcher,
            registrant_id,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn verify_over_http_issues_invoice_and_commits() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!(
            "{}/registrants/{}/verify",
            server.base_url, server.registrant_id
        ))
        .header("x-admin-id", AdminId::new().to_string())
        .json(&json!({ "amount": "5000000", "payment_method": "bank transfer" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["remaining"], "10000000");

    let stored = server.store.registrant(&server.registrant_id).unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Verified);
    assert_eq!(server.store.invoices().len(), 1);
    assert_eq!(server.dispatcher.sent().len(), 1);
}

#[tokio::test]
async fn notification_failure_over_http_leaves_no_trace() {
    let server = TestServer::spawn().await;
    server.dispatcher.set_failing(true);
    let client = reqwest::Client::new();

    let res = client
        .post(format!(
            "{}/registrants/{}/verify",
            server.base_url, server.registrant_id
        ))
        .header("x-admin-id", AdminId::new().to_string())
        .json(&json!({ "amount": "5000000" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(server.store.registrant(&server.registrant_id).unwrap().is_pending());
    assert!(server.store.invoices().is_empty());
}

#[tokio::test]
async fn reject_over_http_sets_rejected() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!(
            "{}/registrants/{}/reject",
            server.base_url, server.registrant_id
        ))
        .header("x-admin-id", AdminId::new().to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let stored = server.store.registrant(&server.registrant_id).unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Rejected);
}

#[tokio::test]
async fn health_endpoint_answers() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/healthz", server.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "ok");
}
