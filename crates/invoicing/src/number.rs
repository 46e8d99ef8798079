//! Invoice numbers in the `YYYY####` format.
//!
//! The string format is load-bearing: it appears on receipts and in the
//! ledger, and downstream tooling parses it. Numbers are strictly increasing
//! within a year and never reused; gaps are permitted (a number consumed by
//! an aborted verification stays consumed).

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use rihla_core::DomainError;

/// A `YYYY####` invoice number: four-digit year followed by a four-digit,
/// zero-padded, per-year sequence (e.g. `20240013`).
///
/// Ordering is `(year, sequence)`, which coincides with lexicographic order
/// of the string form within a year.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvoiceNumber {
    year: i32,
    sequence: u32,
}

impl InvoiceNumber {
    /// Sequences are per-year and 1-based; `0000` is not a valid number.
    pub const MAX_SEQUENCE: u32 = 9999;

    pub fn new(year: i32, sequence: u32) -> Result<Self, DomainError> {
        if !(1000..=9999).contains(&year) {
            return Err(DomainError::validation(format!(
                "invoice year out of range: {year}"
            )));
        }
        if sequence == 0 || sequence > Self::MAX_SEQUENCE {
            return Err(DomainError::validation(format!(
                "invoice sequence out of range: {sequence}"
            )));
        }
        Ok(Self { year, sequence })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl core::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}{:04}", self.year, self.sequence)
    }
}

impl FromStr for InvoiceNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_id(format!(
                "invoice number must be 8 digits, got '{s}'"
            )));
        }
        let year: i32 = s[..4]
            .parse()
            .map_err(|e| DomainError::invalid_id(format!("invoice year: {e}")))?;
        let sequence: u32 = s[4..]
            .parse()
            .map_err(|e| DomainError::invalid_id(format!("invoice sequence: {e}")))?;
        Self::new(year, sequence)
    }
}

impl TryFrom<String> for InvoiceNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InvoiceNumber> for String {
    fn from(value: InvoiceNumber) -> Self {
        value.to_string()
    }
}
