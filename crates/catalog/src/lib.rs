//! `tienda-catalog` — catalog records and browse vocabulary.
//!
//! Everything here is read-only to the reservation core: categories, sizes
//! and products are created and edited by catalog management, which is an
//! external collaborator.

pub mod category;
pub mod product;

pub use category::Category;
pub use product::{PriceSort, Product, ProductFilter, Size};
