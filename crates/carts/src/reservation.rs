use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use tienda_core::{CartId, Entity, ProductId, ReservationId, StockUnitId};

/// How long an uncommitted reservation holds its stock.
pub const DEFAULT_HOLD_MINUTES: i64 = 15;

/// The default hold window as a `chrono::Duration`.
pub fn default_hold() -> Duration {
    Duration::minutes(DEFAULT_HOLD_MINUTES)
}

/// A cart line item holding debited stock.
///
/// `created_at` anchors the expiry window. A reservation existing implies
/// its quantity has already left `stock_unit_id`'s availability; the stock
/// unit reference is nullable so a unit deleted by catalog management does
/// not strand the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub stock_unit_id: Option<StockUnitId>,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(
        cart_id: CartId,
        product_id: ProductId,
        stock_unit_id: StockUnitId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            cart_id,
            product_id,
            stock_unit_id: Some(stock_unit_id),
            quantity,
            created_at: now,
        }
    }

    /// When the hold lapses: creation time plus the hold window.
    pub fn expires_at(&self, hold: Duration) -> DateTime<Utc> {
        self.created_at + hold
    }

    /// Strictly past the deadline. A reservation created at T is still live
    /// at exactly T + hold and expired any instant after.
    pub fn is_expired(&self, now: DateTime<Utc>, hold: Duration) -> bool {
        self.created_at < now - hold
    }
}

impl Entity for Reservation {
    type Id = ReservationId;

    fn id(&self) -> &ReservationId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation_at(created: DateTime<Utc>) -> Reservation {
        Reservation::new(
            CartId::new(),
            ProductId::new(),
            StockUnitId::new(),
            1,
            created,
        )
    }

    #[test]
    fn live_just_before_the_deadline() {
        let t0 = Utc::now();
        let r = reservation_at(t0);
        let almost = t0 + Duration::minutes(14) + Duration::seconds(59);
        assert!(!r.is_expired(almost, default_hold()));
    }

    #[test]
    fn expired_just_after_the_deadline() {
        let t0 = Utc::now();
        let r = reservation_at(t0);
        let past = t0 + Duration::minutes(15) + Duration::seconds(1);
        assert!(r.is_expired(past, default_hold()));
    }

    #[test]
    fn expires_at_is_creation_plus_hold() {
        let t0 = Utc::now();
        let r = reservation_at(t0);
        assert_eq!(r.expires_at(default_hold()), t0 + Duration::minutes(15));
    }
}
