//! `tienda-orders` — orders and the reservation → order-line promotion.

pub mod order;

pub use order::{Order, OrderLine, OrderStatus};
