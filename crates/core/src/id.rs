//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $t:ident) => {
        $(#[$doc])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in
            /// tests for determinism.
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
                let uuid = Uuid::from_str(s).map_err(|e| {
                    DomainError::validation(format!("{}: {}", stringify!($t), e))
                })?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_id!(
    /// Identifier of a storefront user (actor identity).
    UserId
);
uuid_id!(
    /// Identifier of a catalog category.
    CategoryId
);
uuid_id!(
    /// Identifier of a size (S, M, L, ...).
    SizeId
);
uuid_id!(
    /// Identifier of a catalog product.
    ProductId
);
uuid_id!(
    /// Identifier of a stock unit (product × size inventory row).
    StockUnitId
);
uuid_id!(
    /// Identifier of a cart.
    CartId
);
uuid_id!(
    /// Identifier of a cart reservation (line item holding stock).
    ReservationId
);
uuid_id!(
    /// Identifier of an order.
    OrderId
);

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    #[test]
    fn round_trips_through_display_and_from_str() {
        let id = StockUnitId::new();
        let parsed = StockUnitId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_malformed_input() {
        let err = ProductId::from_str("not-a-uuid").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn serializes_transparently() {
        let id = OrderId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
