//! `tienda-inventory` — the inventory ledger's domain rules.
//!
//! A [`StockUnit`] tracks the available quantity of one (product, size)
//! variant. Its `debit`/`credit` transitions are the only way stock moves;
//! the storage layer is responsible for applying them atomically per unit.

pub mod stock_unit;

pub use stock_unit::StockUnit;
