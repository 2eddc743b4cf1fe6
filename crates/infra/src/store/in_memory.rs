use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tienda_carts::{Cart, Reservation};
use tienda_catalog::{Category, PriceSort, Product, ProductFilter, Size};
use tienda_core::{
    CartId, CategoryId, DomainError, OrderId, ProductId, ReservationId, SizeId, StockUnitId,
    UserId,
};
use tienda_inventory::StockUnit;
use tienda_orders::{Order, OrderStatus};

use super::{Store, StoreError};

#[derive(Debug, Default)]
struct State {
    categories: HashMap<CategoryId, Category>,
    sizes: HashMap<SizeId, Size>,
    products: HashMap<ProductId, Product>,
    stock_units: HashMap<StockUnitId, StockUnit>,
    carts: HashMap<CartId, Cart>,
    reservations: HashMap<ReservationId, Reservation>,
    orders: HashMap<OrderId, Order>,
}

/// In-memory store for tests and development.
///
/// One `RwLock` guards all state, so every mutating operation (notably the
/// conditional stock debit) is a single atomic read-modify-write, which is
/// exactly the guarantee the `Store` contract asks of a relational backend.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::storage("lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::storage("lock poisoned"))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn put_category(&self, category: Category) -> Result<(), StoreError> {
        self.write()?.categories.insert(category.id, category);
        Ok(())
    }

    async fn put_size(&self, size: Size) -> Result<(), StoreError> {
        self.write()?.sizes.insert(size.id, size);
        Ok(())
    }

    async fn put_product(&self, product: Product) -> Result<(), StoreError> {
        self.write()?.products.insert(product.id, product);
        Ok(())
    }

    async fn put_stock_unit(&self, unit: StockUnit) -> Result<(), StoreError> {
        self.write()?.stock_units.insert(unit.id, unit);
        Ok(())
    }

    async fn remove_stock_unit(&self, id: StockUnitId) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        let removed = state.stock_units.remove(&id).is_some();
        // Lines pointing at the unit keep their debited stock but lose the
        // reference, matching an ON DELETE SET NULL foreign key.
        if removed {
            for reservation in state.reservations.values_mut() {
                if reservation.stock_unit_id == Some(id) {
                    reservation.stock_unit_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        let mut all: Vec<Category> = self.read()?.categories.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let state = self.read()?;

        let category_id = match &filter.category_slug {
            Some(slug) => {
                match state.categories.values().find(|c| &c.slug == slug) {
                    Some(category) => Some(category.id),
                    // Unknown category slug matches nothing.
                    None => return Ok(Vec::new()),
                }
            }
            None => None,
        };

        let mut matches: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.is_active)
            .filter(|p| category_id.is_none_or(|c| p.category_id == c))
            .cloned()
            .collect();

        match filter.sort {
            Some(sort) => matches.sort_by(|a, b| sort.compare(a, b)),
            // Newest first, slug as a stable tiebreak.
            None => matches.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| a.slug.cmp(&b.slug))
            }),
        }

        Ok(matches)
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, StoreError> {
        Ok(self
            .read()?
            .products
            .values()
            .find(|p| p.slug == slug)
            .cloned())
    }

    async fn size(&self, id: SizeId) -> Result<Option<Size>, StoreError> {
        Ok(self.read()?.sizes.get(&id).cloned())
    }

    async fn stock_unit(&self, id: StockUnitId) -> Result<Option<StockUnit>, StoreError> {
        Ok(self.read()?.stock_units.get(&id).cloned())
    }

    async fn stock_units_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockUnit>, StoreError> {
        let mut units: Vec<StockUnit> = self
            .read()?
            .stock_units
            .values()
            .filter(|u| u.product_id == product_id)
            .cloned()
            .collect();
        units.sort_by_key(|u| u.size_id);
        Ok(units)
    }

    async fn debit_stock(&self, id: StockUnitId, quantity: u32) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let unit = state
            .stock_units
            .get_mut(&id)
            .ok_or(DomainError::NotFound)?;
        unit.debit(quantity)?;
        tracing::debug!(stock_unit = %id, quantity, available = unit.available, "stock debited");
        Ok(())
    }

    async fn credit_stock(&self, id: StockUnitId, quantity: u32) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let unit = state
            .stock_units
            .get_mut(&id)
            .ok_or(DomainError::NotFound)?;
        unit.credit(quantity)?;
        tracing::debug!(stock_unit = %id, quantity, available = unit.available, "stock credited");
        Ok(())
    }

    async fn find_or_create_cart(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Cart, StoreError> {
        let mut state = self.write()?;
        if let Some(cart) = state
            .carts
            .values()
            .find(|c| c.user_id == Some(user_id))
            .cloned()
        {
            return Ok(cart);
        }
        let cart = Cart::new(Some(user_id), now);
        state.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn cart_for_user(&self, user_id: UserId) -> Result<Option<Cart>, StoreError> {
        Ok(self
            .read()?
            .carts
            .values()
            .find(|c| c.user_id == Some(user_id))
            .cloned())
    }

    async fn insert_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if let Some(cart) = state.carts.get_mut(&reservation.cart_id) {
            cart.touch(reservation.created_at);
        }
        state.reservations.insert(reservation.id, reservation);
        Ok(())
    }

    async fn reservations_for_cart(
        &self,
        cart_id: CartId,
    ) -> Result<Vec<Reservation>, StoreError> {
        let mut items: Vec<Reservation> = self
            .read()?
            .reservations
            .values()
            .filter(|r| r.cart_id == cart_id)
            .cloned()
            .collect();
        items.sort_by_key(|r| (r.created_at, r.id));
        Ok(items)
    }

    async fn reservations_created_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, StoreError> {
        let mut items: Vec<Reservation> = self
            .read()?
            .reservations
            .values()
            .filter(|r| r.created_at < threshold)
            .cloned()
            .collect();
        items.sort_by_key(|r| (r.created_at, r.id));
        Ok(items)
    }

    async fn remove_reservation(&self, id: ReservationId) -> Result<bool, StoreError> {
        Ok(self.write()?.reservations.remove(&id).is_some())
    }

    async fn place_order(&self, order: Order, cart_id: CartId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.reservations.retain(|_, r| r.cart_id != cart_id);
        if let Some(cart) = state.carts.get_mut(&cart_id) {
            cart.touch(order.created_at);
        }
        state.orders.insert(order.id, order);
        Ok(())
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.read()?.orders.get(&id).cloned())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let order = state.orders.get_mut(&id).ok_or(DomainError::NotFound)?;
        order.transition_to(next, now)?;
        Ok(())
    }
}
