//! Storage boundary for the reservation core.
//!
//! Atomicity contract: `debit_stock` and `credit_stock` are single atomic
//! read-modify-writes per stock unit (a conditional update guarded by the
//! current value), and `place_order` persists the order and clears the
//! cart's reservations as one transaction. Everything else is a plain
//! short-lived read or write; nothing blocks indefinitely.

mod in_memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use tienda_carts::{Cart, Reservation};
use tienda_catalog::{Category, Product, ProductFilter, Size};
use tienda_core::{
    CartId, DomainError, OrderId, ProductId, ReservationId, SizeId, StockUnitId, UserId,
};
use tienda_inventory::StockUnit;
use tienda_orders::{Order, OrderStatus};

pub use in_memory::InMemoryStore;
pub use postgres::PgStore;

/// Store operation error: either a deterministic domain failure the caller
/// can surface or retry, or an infrastructure failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// The domain failure inside, if this is one.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(e) => Some(e),
            Self::Storage(_) => None,
        }
    }
}

/// Relational persistence for the storefront core.
///
/// Catalog records (categories, sizes, products, stock seeding) are written
/// by catalog management, an external collaborator, and are read-only to
/// the reservation/checkout services.
#[async_trait]
pub trait Store: Send + Sync {
    // Catalog management (external collaborator writes; upserts by id).
    async fn put_category(&self, category: Category) -> Result<(), StoreError>;
    async fn put_size(&self, size: Size) -> Result<(), StoreError>;
    async fn put_product(&self, product: Product) -> Result<(), StoreError>;
    async fn put_stock_unit(&self, unit: StockUnit) -> Result<(), StoreError>;
    /// Returns `false` when the unit was already gone.
    async fn remove_stock_unit(&self, id: StockUnitId) -> Result<bool, StoreError>;

    // Catalog reads.
    /// All categories, ordered by name.
    async fn categories(&self) -> Result<Vec<Category>, StoreError>;
    /// Active products matching the filter, in the filter's price order
    /// (newest first when no order is requested).
    async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;
    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, StoreError>;
    async fn size(&self, id: SizeId) -> Result<Option<Size>, StoreError>;
    async fn stock_unit(&self, id: StockUnitId) -> Result<Option<StockUnit>, StoreError>;
    async fn stock_units_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockUnit>, StoreError>;

    // Inventory ledger.
    /// Atomically decrement availability, only if `available >= quantity`;
    /// otherwise fail `InsufficientStock` with no change.
    async fn debit_stock(&self, id: StockUnitId, quantity: u32) -> Result<(), StoreError>;
    /// Atomically increment availability; `NotFound` if the unit vanished.
    async fn credit_stock(&self, id: StockUnitId, quantity: u32) -> Result<(), StoreError>;

    // Carts and reservations.
    async fn find_or_create_cart(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Cart, StoreError>;
    async fn cart_for_user(&self, user_id: UserId) -> Result<Option<Cart>, StoreError>;
    async fn insert_reservation(&self, reservation: Reservation) -> Result<(), StoreError>;
    async fn reservations_for_cart(
        &self,
        cart_id: CartId,
    ) -> Result<Vec<Reservation>, StoreError>;
    /// Reservations created strictly before `threshold`, across all carts.
    async fn reservations_created_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, StoreError>;
    /// Returns `false` when the reservation was already gone (deleting a
    /// nonexistent reservation is a no-op, not an error).
    async fn remove_reservation(&self, id: ReservationId) -> Result<bool, StoreError>;

    // Orders.
    /// Persist the order and delete the cart's reservations in one
    /// transaction. The cart row itself persists, empty.
    async fn place_order(&self, order: Order, cart_id: CartId) -> Result<(), StoreError>;
    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;
    /// Apply a status transition, enforcing the order lifecycle.
    async fn update_order_status(
        &self,
        id: OrderId,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> Store for std::sync::Arc<S>
where
    S: Store + ?Sized,
{
    async fn put_category(&self, category: Category) -> Result<(), StoreError> {
        (**self).put_category(category).await
    }

    async fn put_size(&self, size: Size) -> Result<(), StoreError> {
        (**self).put_size(size).await
    }

    async fn put_product(&self, product: Product) -> Result<(), StoreError> {
        (**self).put_product(product).await
    }

    async fn put_stock_unit(&self, unit: StockUnit) -> Result<(), StoreError> {
        (**self).put_stock_unit(unit).await
    }

    async fn remove_stock_unit(&self, id: StockUnitId) -> Result<bool, StoreError> {
        (**self).remove_stock_unit(id).await
    }

    async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        (**self).categories().await
    }

    async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        (**self).products(filter).await
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).product(id).await
    }

    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, StoreError> {
        (**self).product_by_slug(slug).await
    }

    async fn size(&self, id: SizeId) -> Result<Option<Size>, StoreError> {
        (**self).size(id).await
    }

    async fn stock_unit(&self, id: StockUnitId) -> Result<Option<StockUnit>, StoreError> {
        (**self).stock_unit(id).await
    }

    async fn stock_units_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockUnit>, StoreError> {
        (**self).stock_units_for_product(product_id).await
    }

    async fn debit_stock(&self, id: StockUnitId, quantity: u32) -> Result<(), StoreError> {
        (**self).debit_stock(id, quantity).await
    }

    async fn credit_stock(&self, id: StockUnitId, quantity: u32) -> Result<(), StoreError> {
        (**self).credit_stock(id, quantity).await
    }

    async fn find_or_create_cart(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Cart, StoreError> {
        (**self).find_or_create_cart(user_id, now).await
    }

    async fn cart_for_user(&self, user_id: UserId) -> Result<Option<Cart>, StoreError> {
        (**self).cart_for_user(user_id).await
    }

    async fn insert_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        (**self).insert_reservation(reservation).await
    }

    async fn reservations_for_cart(
        &self,
        cart_id: CartId,
    ) -> Result<Vec<Reservation>, StoreError> {
        (**self).reservations_for_cart(cart_id).await
    }

    async fn reservations_created_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, StoreError> {
        (**self).reservations_created_before(threshold).await
    }

    async fn remove_reservation(&self, id: ReservationId) -> Result<bool, StoreError> {
        (**self).remove_reservation(id).await
    }

    async fn place_order(&self, order: Order, cart_id: CartId) -> Result<(), StoreError> {
        (**self).place_order(order, cart_id).await
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).order(id).await
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        (**self).update_order_status(id, next, now).await
    }
}
