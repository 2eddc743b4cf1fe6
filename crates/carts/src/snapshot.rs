use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use tienda_catalog::Product;
use tienda_core::Money;

use crate::cart::Cart;
use crate::reservation::Reservation;

/// One snapshot line: a reservation joined with its live product.
///
/// `line_total` is quantity × the product's **current** price; prices are
/// not frozen at add-time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub reservation: Reservation,
    pub product: Product,
    pub line_total: Money,
}

/// What the cart page renders: lines, live total, and the countdown anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub cart: Option<Cart>,
    pub lines: Vec<CartLine>,
    pub total: Money,
    /// Oldest reservation's creation time + hold; drives the countdown.
    /// Absent when the cart is empty.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CartSnapshot {
    /// Snapshot for a user with no cart at all.
    pub fn empty() -> Self {
        Self {
            cart: None,
            lines: Vec::new(),
            total: Money::ZERO,
            expires_at: None,
        }
    }

    /// Join reservations with their live products and total them up.
    pub fn assemble(
        cart: Cart,
        items: Vec<(Reservation, Product)>,
        hold: Duration,
    ) -> Self {
        let expires_at = items
            .iter()
            .map(|(r, _)| r.created_at)
            .min()
            .map(|oldest| oldest + hold);

        let lines: Vec<CartLine> = items
            .into_iter()
            .map(|(reservation, product)| {
                let line_total = product.price * reservation.quantity;
                CartLine {
                    reservation,
                    product,
                    line_total,
                }
            })
            .collect();

        let total = lines.iter().map(|l| l.line_total).sum();

        Self {
            cart: Some(cart),
            lines,
            total,
            expires_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation::default_hold;
    use tienda_core::{CategoryId, StockUnitId};

    fn product(price: Money) -> Product {
        Product::new(CategoryId::new(), "Remera", "remera", price, Utc::now()).unwrap()
    }

    fn reservation(
        cart: &Cart,
        product: &Product,
        quantity: u32,
        created: DateTime<Utc>,
    ) -> Reservation {
        Reservation::new(cart.id, product.id, StockUnitId::new(), quantity, created)
    }

    #[test]
    fn totals_use_live_prices() {
        let now = Utc::now();
        let cart = Cart::new(None, now);
        let tee = product(Money::from_parts(10, 0));
        let cap = product(Money::from_parts(5, 0));

        let snapshot = CartSnapshot::assemble(
            cart.clone(),
            vec![
                (reservation(&cart, &tee, 2, now), tee.clone()),
                (reservation(&cart, &cap, 1, now), cap.clone()),
            ],
            default_hold(),
        );

        assert_eq!(snapshot.total, Money::from_parts(25, 0));
        assert_eq!(snapshot.lines[0].line_total, Money::from_parts(20, 0));
    }

    #[test]
    fn countdown_anchors_on_the_oldest_reservation() {
        let now = Utc::now();
        let cart = Cart::new(None, now);
        let tee = product(Money::from_parts(10, 0));
        let older = now - Duration::minutes(5);

        let snapshot = CartSnapshot::assemble(
            cart.clone(),
            vec![
                (reservation(&cart, &tee, 1, now), tee.clone()),
                (reservation(&cart, &tee, 1, older), tee.clone()),
            ],
            default_hold(),
        );

        assert_eq!(snapshot.expires_at, Some(older + default_hold()));
    }

    #[test]
    fn empty_snapshot_has_no_countdown() {
        let snapshot = CartSnapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.total, Money::ZERO);
        assert_eq!(snapshot.expires_at, None);
    }
}
