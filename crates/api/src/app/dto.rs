use serde::{Deserialize, Serialize};

/// Body of `POST /registrants/:id/verify`.
///
/// The amount travels as a string so the admin form's exact decimal survives
/// the trip (no float rounding on the wire).
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    pub amount: String,
    pub payment_method: Option<String>,
}

/// Response of a successful verification.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyPaymentResponse {
    pub invoice_number: String,
    pub remaining: String,
}
