//! Checkout: turn a cart's live reservations into an order awaiting
//! payment.
//!
//! Placing the order captures unit prices as they are at that instant and
//! clears the cart in the same store transaction. Stock is not touched; the
//! reservations already debited it when the items went into the cart.

use chrono::{DateTime, Utc};

use tienda_core::{DomainError, UserId};
use tienda_orders::Order;

use crate::reservations::ReservationManager;
use crate::store::{Store, StoreError};

/// What the shopper needs to complete payment out of band.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order: Order,
    /// Transfer destination shown to the shopper.
    pub payment_alias: String,
}

/// Finalizes carts into pending-transfer orders.
#[derive(Debug, Clone)]
pub struct Checkout<S> {
    manager: ReservationManager<S>,
    payment_alias: String,
}

impl<S: Store> Checkout<S> {
    pub fn new(manager: ReservationManager<S>, payment_alias: impl Into<String>) -> Self {
        Self {
            manager,
            payment_alias: payment_alias.into(),
        }
    }

    pub fn manager(&self) -> &ReservationManager<S> {
        &self.manager
    }

    /// Place an order for everything currently reserved in the user's cart.
    ///
    /// Expired holds are swept first, so only live reservations make it into
    /// the order. An empty (or missing, or fully-expired) cart is an
    /// [`DomainError::EmptyCart`] rather than a zero-total order.
    pub async fn checkout(
        &self,
        user: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<CheckoutReceipt, StoreError> {
        let user = user.ok_or(DomainError::Unauthenticated)?;

        self.manager.sweep_expired(now).await?;

        let store = self.manager.store();
        let cart = store
            .cart_for_user(user)
            .await?
            .ok_or(DomainError::EmptyCart)?;
        let reservations = store.reservations_for_cart(cart.id).await?;
        if reservations.is_empty() {
            return Err(DomainError::EmptyCart.into());
        }

        let mut items = Vec::with_capacity(reservations.len());
        for reservation in reservations {
            let product = store
                .product(reservation.product_id)
                .await?
                .ok_or(DomainError::NotFound)?;
            items.push((reservation, product));
        }

        let order = Order::from_reservations(user, &items, now)?;
        store.place_order(order.clone(), cart.id).await?;

        tracing::info!(
            order = %order.id,
            total = %order.total,
            lines = order.lines.len(),
            "order placed, awaiting transfer"
        );
        Ok(CheckoutReceipt {
            order,
            payment_alias: self.payment_alias.clone(),
        })
    }
}
