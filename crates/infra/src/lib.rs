//! Infrastructure layer: storage backends and the storefront services.
//!
//! The [`store::Store`] trait is the transactional boundary the reservation
//! core relies on: per-unit stock movements are atomic read-modify-writes,
//! and order placement clears the cart in the same transaction. Two
//! backends implement it: [`store::InMemoryStore`] for tests and dev,
//! [`store::PgStore`] for production.

pub mod browse;
pub mod checkout;
pub mod reservations;
pub mod store;

pub use browse::{CatalogBrowse, SizeOption};
pub use checkout::{Checkout, CheckoutReceipt};
pub use reservations::ReservationManager;
pub use store::{InMemoryStore, PgStore, Store, StoreError};

#[cfg(test)]
mod integration_tests;
