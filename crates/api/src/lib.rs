//! `rihla-api` — admin command surface for payment verification.
//!
//! Two operations, scoped to one registrant and one acting admin: verify
//! with an amount, or reject. Sessions, page rendering and the rest of the
//! back office live elsewhere; the admin identity arrives as an `x-admin-id`
//! header installed by that outer layer and is passed down explicitly.

pub mod app;
