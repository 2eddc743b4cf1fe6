//! Cart reservations over a [`Store`].
//!
//! Adding an item debits the stock unit first and only then records the
//! reservation, so a row in the cart always corresponds to stock already
//! taken off the shelf. Reservations are held for a fixed duration;
//! [`ReservationManager::sweep_expired`] runs before every cart-facing
//! operation so callers never observe a stale hold.

use chrono::{DateTime, Duration, Utc};

use tienda_carts::{default_hold, CartSnapshot, Reservation};
use tienda_core::{DomainError, StockUnitId, UserId};

use crate::store::{Store, StoreError};

/// Coordinates stock debits, cart holds, and their expiry.
#[derive(Debug, Clone)]
pub struct ReservationManager<S> {
    store: S,
    hold: Duration,
}

impl<S: Store> ReservationManager<S> {
    /// Manager with the standard hold duration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            hold: default_hold(),
        }
    }

    /// Override the hold duration. Mostly useful in tests and ops tooling.
    pub fn with_hold(store: S, hold: Duration) -> Self {
        Self { store, hold }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }

    /// Reserve `quantity` units of a stock unit for the user's cart.
    ///
    /// The debit happens before the reservation row exists; if the debit
    /// fails nothing is written. A `None` stock unit means the shopper never
    /// picked a size, which is rejected before touching the store.
    pub async fn add(
        &self,
        user: Option<UserId>,
        stock_unit_id: Option<StockUnitId>,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<Reservation, StoreError> {
        let user = user.ok_or(DomainError::Unauthenticated)?;
        let stock_unit_id = stock_unit_id.ok_or(DomainError::InvalidSelection)?;

        self.sweep_expired(now).await?;

        let unit = self
            .store
            .stock_unit(stock_unit_id)
            .await?
            .ok_or(DomainError::NotFound)?;

        self.store.debit_stock(unit.id, quantity).await?;

        let cart = self.store.find_or_create_cart(user, now).await?;
        let reservation = Reservation::new(cart.id, unit.product_id, unit.id, quantity, now);
        self.store.insert_reservation(reservation.clone()).await?;

        tracing::info!(
            cart = %cart.id,
            stock_unit = %unit.id,
            quantity,
            "item reserved"
        );
        Ok(reservation)
    }

    /// Release every reservation older than the hold duration, crediting its
    /// stock back. Returns how many reservations were released.
    ///
    /// Safe to call repeatedly; a second sweep at the same instant finds
    /// nothing to do. A reservation whose stock unit has since been deleted
    /// is dropped without a credit.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let threshold = now - self.hold;
        let expired = self.store.reservations_created_before(threshold).await?;

        let mut released = 0;
        for reservation in expired {
            if let Some(stock_unit_id) = reservation.stock_unit_id {
                match self
                    .store
                    .credit_stock(stock_unit_id, reservation.quantity)
                    .await
                {
                    Ok(()) => {}
                    Err(e) if matches!(e.as_domain(), Some(DomainError::NotFound)) => {
                        tracing::warn!(
                            reservation = %reservation.id,
                            stock_unit = %stock_unit_id,
                            "stock unit gone, releasing hold without credit"
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
            if self.store.remove_reservation(reservation.id).await? {
                released += 1;
            }
        }

        if released > 0 {
            tracing::info!(released, "expired reservations released");
        }
        Ok(released)
    }

    /// Current contents of the user's cart, priced live, after sweeping
    /// expired holds. A user with no cart yet gets an empty snapshot.
    pub async fn cart_snapshot(
        &self,
        user: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<CartSnapshot, StoreError> {
        let user = user.ok_or(DomainError::Unauthenticated)?;

        self.sweep_expired(now).await?;

        let Some(cart) = self.store.cart_for_user(user).await? else {
            return Ok(CartSnapshot::empty());
        };

        let reservations = self.store.reservations_for_cart(cart.id).await?;
        let mut items = Vec::with_capacity(reservations.len());
        for reservation in reservations {
            match self.store.product(reservation.product_id).await? {
                Some(product) => items.push((reservation, product)),
                None => {
                    tracing::warn!(
                        reservation = %reservation.id,
                        product = %reservation.product_id,
                        "product missing, omitting cart line"
                    );
                }
            }
        }

        Ok(CartSnapshot::assemble(cart, items, self.hold))
    }
}
