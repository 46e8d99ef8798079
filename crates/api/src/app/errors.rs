use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use rihla_infra::VerificationError;

/// Map workflow errors to admin-facing responses.
///
/// 4xx means "nothing happened, fix the request and try again"; 502/500
/// means "payment state unclear, check server logs". In the latter case the
/// data change was rolled back, but the admin must not read the response as
/// success.
pub fn verification_error_to_response(err: VerificationError) -> axum::response::Response {
    match err {
        VerificationError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "registrant not found"),
        VerificationError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        VerificationError::InvalidState(msg) => {
            json_error(StatusCode::CONFLICT, "invalid_state", msg)
        }
        VerificationError::AllocationConflict(msg) => {
            json_error(StatusCode::CONFLICT, "allocation_conflict", msg)
        }
        VerificationError::Notification(msg) => json_error(
            StatusCode::BAD_GATEWAY,
            "notification_error",
            format!("payment state unclear, check server logs: {msg}"),
        ),
        VerificationError::Persistence(msg) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "persistence_error",
            format!("payment state unclear, check server logs: {msg}"),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
