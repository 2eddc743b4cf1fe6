//! `tienda-carts` — cart and reservation lifecycle.
//!
//! A reservation is a cart line whose stock has **already been debited**
//! from its stock unit. It either expires (sweep credits the stock back) or
//! is promoted into an order line at checkout. There is no extend
//! operation.

pub mod cart;
pub mod reservation;
pub mod snapshot;

pub use cart::Cart;
pub use reservation::{DEFAULT_HOLD_MINUTES, Reservation, default_hold};
pub use snapshot::{CartLine, CartSnapshot};
