//! `rihla-invoicing` — invoice numbers, payment categories, and the
//! append-only invoice record issued at payment verification.

pub mod invoice;
pub mod number;

pub use invoice::{Invoice, PaymentCategory};
pub use number::InvoiceNumber;
