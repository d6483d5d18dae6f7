//! Strongly-typed identifiers used across the domain.
//!
//! Identifiers are `i64` newtypes rather than UUIDs: the wire contract for the
//! sale endpoints is numeric (`goodsId=<integer>`, order ids compared against
//! `0`/`-1` by pollers), and the durable stores key on bigint columns.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a user (authenticated buyer).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

/// Identifier of a goods item on sale.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoodsId(i64);

/// Identifier of a materialized order. Always `> 0` once assigned.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(i64);

macro_rules! impl_i64_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<i64>()
                    .map(Self)
                    .map_err(|_| DomainError::invalid_id(concat!("invalid ", $name)))
            }
        }
    };
}

impl_i64_newtype!(UserId, "user id");
impl_i64_newtype!(GoodsId, "goods id");
impl_i64_newtype!(OrderId, "order id");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_from_decimal_string() {
        let id: GoodsId = "42".parse().unwrap();
        assert_eq!(id, GoodsId::new(42));
    }

    #[test]
    fn rejects_non_numeric() {
        assert!("abc".parse::<GoodsId>().is_err());
        assert!("".parse::<UserId>().is_err());
    }

    #[test]
    fn serde_is_transparent() {
        let id = OrderId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        let back: OrderId = serde_json::from_str("7").unwrap();
        assert_eq!(back, id);
    }
}
