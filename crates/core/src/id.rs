//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a travel package.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(Uuid);

/// Identifier of an administrative actor (who verified/rejected a payment).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdminId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(PackageId, "PackageId");
impl_uuid_newtype!(AdminId, "AdminId");

/// National-id style registrant key: a fixed-length numeric string.
///
/// Registrants are keyed by the 16-digit identity number they register with,
/// not by a surrogate id. The string form is preserved exactly (leading zeros
/// matter).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrantId(String);

impl RegistrantId {
    pub const LEN: usize = 16;

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RegistrantId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RegistrantId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::LEN {
            return Err(DomainError::invalid_id(format!(
                "RegistrantId: expected {} digits, got {}",
                Self::LEN,
                s.len()
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_id(
                "RegistrantId: must be numeric".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registrant_id_accepts_sixteen_digits() {
        let id: RegistrantId = "3174012345678901".parse().unwrap();
        assert_eq!(id.as_str(), "3174012345678901");
    }

    #[test]
    fn registrant_id_preserves_leading_zeros() {
        let id: RegistrantId = "0074012345678901".parse().unwrap();
        assert_eq!(id.to_string(), "0074012345678901");
    }

    #[test]
    fn registrant_id_rejects_wrong_length() {
        assert!("12345".parse::<RegistrantId>().is_err());
        assert!("31740123456789012".parse::<RegistrantId>().is_err());
    }

    #[test]
    fn registrant_id_rejects_non_numeric() {
        assert!("31740123456789ab".parse::<RegistrantId>().is_err());
    }
}
