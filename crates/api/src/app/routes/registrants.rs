use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use rust_decimal::Decimal;

use rihla_core::{AdminId, RegistrantId};
use rihla_infra::{RejectPayment, VerifyPayment};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:id/verify", post(verify_payment))
        .route("/:id/reject", post(reject_payment))
}

/// The acting admin, as installed in `x-admin-id` by the session layer.
/// Passed down explicitly; the workflow never reads ambient identity.
fn admin_actor(headers: &HeaderMap) -> Result<AdminId, axum::response::Response> {
    let Some(value) = headers.get("x-admin-id") else {
        return Err(errors::json_error(
            StatusCode::UNAUTHORIZED,
            "missing_admin_identity",
            "x-admin-id header is required",
        ));
    };
    value
        .to_str()
        .ok()
        .and_then(|s| AdminId::from_str(s).ok())
        .ok_or_else(|| {
            errors::json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_admin_identity",
                "x-admin-id must be a uuid",
            )
        })
}

pub async fn verify_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<dto::VerifyPaymentRequest>,
) -> axum::response::Response {
    let registrant_id: RegistrantId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid registrant id");
        }
    };
    let actor = match admin_actor(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let amount = match Decimal::from_str(&body.amount) {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "amount must be a decimal number",
            );
        }
    };

    let cmd = VerifyPayment {
        registrant_id,
        paid_amount: amount,
        payment_method: body.payment_method,
        actor,
    };

    match services.verify_payment(cmd).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(dto::VerifyPaymentResponse {
                invoice_number: outcome.invoice_number.to_string(),
                remaining: outcome.remaining.to_string(),
            }),
        )
            .into_response(),
        Err(e) => errors::verification_error_to_response(e),
    }
}

pub async fn reject_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    let registrant_id: RegistrantId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid registrant id");
        }
    };
    let actor = match admin_actor(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match services
        .reject_payment(RejectPayment {
            registrant_id,
            actor,
        })
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::verification_error_to_response(e),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use rihla_core::PackageId;
    use rihla_infra::RecordingDispatcher;
    use rihla_registrants::{Package, PaymentStatus, Registrant, RoomType};

    use super::*;
    use crate::app::services::{AppServices, build_in_memory_services};
    use rihla_infra::InMemoryStore;

    fn seeded() -> (axum::Router, InMemoryStore, Arc<RecordingDispatcher>, RegistrantId) {
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
        let app = crate::app::router(Arc::new(services));
        (app, store, dispatcher, registrant_id)
    }

    fn verify_request(id: &str, amount: &str, admin: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/registrants/{id}/verify"))
            .header("content-type", "application/json");
        if let Some(admin) = admin {
            builder = builder.header("x-admin-id", admin);
        }
        builder
            .body(Body::from(
                serde_json::json!({ "amount": amount }).to_string(),
            ))
            .unwrap()
    }

    fn admin() -> String {
        AdminId::new().to_string()
    }

    #[tokio::test]
    async fn verify_returns_invoice_number_and_remaining() {
        let (app, store, _, registrant_id) = seeded();

        let response = app
            .oneshot(verify_request(
                registrant_id.as_str(),
                "5000000",
                Some(&admin()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["remaining"], "10000000");
        assert_eq!(json["invoice_number"].as_str().unwrap().len(), 8);

        let stored = store.registrant(&registrant_id).unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Verified);
    }

    #[tokio::test]
    async fn verify_unknown_registrant_is_404() {
        let (app, _, _, _) = seeded();
        let response = app
            .oneshot(verify_request("9999888877776666", "5000000", Some(&admin())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn verify_without_admin_header_is_401() {
        let (app, _, _, registrant_id) = seeded();
        let response = app
            .oneshot(verify_request(registrant_id.as_str(), "5000000", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn verify_with_bad_amount_is_400() {
        let (app, store, _, registrant_id) = seeded();
        let response = app
            .oneshot(verify_request(
                registrant_id.as_str(),
                "five million",
                Some(&admin()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.registrant(&registrant_id).unwrap().is_pending());
    }

    #[tokio::test]
    async fn second_verify_is_409() {
        let (app, _, _, registrant_id) = seeded();

        let first = app
            .clone()
            .oneshot(verify_request(
                registrant_id.as_str(),
                "15000000",
                Some(&admin()),
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(verify_request(
                registrant_id.as_str(),
                "15000000",
                Some(&admin()),
            ))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn notification_failure_is_502_and_registrant_stays_pending() {
        let (app, store, dispatcher, registrant_id) = seeded();
        dispatcher.set_failing(true);

        let response = app
            .oneshot(verify_request(
                registrant_id.as_str(),
                "5000000",
                Some(&admin()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(store.registrant(&registrant_id).unwrap().is_pending());
    }

    #[tokio::test]
    async fn reject_returns_204_and_sets_rejected() {
        let (app, store, _, registrant_id) = seeded();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/registrants/{registrant_id}/reject"))
                    .header("x-admin-id", admin())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            store.registrant(&registrant_id).unwrap().payment_status,
            PaymentStatus::Rejected
        );
    }
}
