//! `rihla-registrants` — registrant records and the payment state machine.

pub mod package;
pub mod registrant;

pub use package::{Package, RoomType};
pub use registrant::{PaymentStatus, Registrant, VerifiedPayment};
