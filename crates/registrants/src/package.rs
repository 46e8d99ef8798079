//! Travel packages and their per-room-type pricing.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rihla_core::{DomainError, PackageId};

/// Room occupancy tier a registrant books within a package.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Quad,
    Triple,
    Double,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Quad => "quad",
            RoomType::Triple => "triple",
            RoomType::Double => "double",
        }
    }
}

impl core::fmt::Display for RoomType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quad" => Ok(RoomType::Quad),
            "triple" => Ok(RoomType::Triple),
            "double" => Ok(RoomType::Double),
            other => Err(DomainError::validation(format!(
                "unknown room type '{other}' (expected quad, triple or double)"
            ))),
        }
    }
}

/// A travel package as the verification workflow sees it: a program name and
/// a base price per room type. Read-only here; package management is a
/// separate concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub program_name: String,
    pub prices: BTreeMap<RoomType, Decimal>,
    /// ISO-4217 currency code, e.g. "IDR".
    pub currency: String,
}

impl Package {
    pub fn price_for(&self, room_type: RoomType) -> Option<Decimal> {
        self.prices.get(&room_type).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn test_package() -> Package {
        let mut prices = BTreeMap::new();
        prices.insert(RoomType::Quad, Decimal::from(15_000_000));
        prices.insert(RoomType::Double, Decimal::from(21_000_000));
        Package {
            id: PackageId::new(),
            program_name: "Umrah Ramadhan 12 Hari".to_string(),
            prices,
            currency: "IDR".to_string(),
        }
    }

    #[test]
    fn price_for_known_room_type() {
        let package = test_package();
        assert_eq!(
            package.price_for(RoomType::Quad),
            Some(Decimal::from(15_000_000))
        );
    }

    #[test]
    fn price_for_unpriced_room_type_is_none() {
        let package = test_package();
        assert_eq!(package.price_for(RoomType::Triple), None);
    }

    #[test]
    fn room_type_parses_from_lowercase() {
        assert_eq!("quad".parse::<RoomType>().unwrap(), RoomType::Quad);
        assert!("suite".parse::<RoomType>().is_err());
    }
}
