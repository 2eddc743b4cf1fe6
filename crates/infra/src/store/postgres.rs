//! Postgres-backed store.
//!
//! The atomicity the `Store` contract requires is pushed down to the
//! database: the stock debit is one conditional `UPDATE` guarded by the
//! current availability (no read-then-write window), and order placement
//! runs in a transaction. `sqlx::Error`s surface as `StoreError::Storage`
//! with the failing operation named.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use tienda_carts::{Cart, Reservation};
use tienda_catalog::{Category, PriceSort, Product, ProductFilter, Size};
use tienda_core::{
    CartId, CategoryId, DomainError, Money, OrderId, ProductId, ReservationId, SizeId,
    StockUnitId, UserId,
};
use tienda_inventory::StockUnit;
use tienda_orders::{Order, OrderLine, OrderStatus};

use super::{Store, StoreError};

/// Postgres-backed store. Cheap to clone; all operations go through the
/// connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

fn map_sqlx(op: &str, e: sqlx::Error) -> StoreError {
    StoreError::storage(format!("{op}: {e}"))
}

fn status_text(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::PendingTransfer => "pending_transfer",
        OrderStatus::Confirmed => "confirmed",
        OrderStatus::Cancelled => "cancelled",
    }
}

fn parse_status(text: &str) -> Result<OrderStatus, StoreError> {
    match text {
        "pending_transfer" => Ok(OrderStatus::PendingTransfer),
        "confirmed" => Ok(OrderStatus::Confirmed),
        "cancelled" => Ok(OrderStatus::Cancelled),
        other => Err(StoreError::storage(format!("unknown order status {other:?}"))),
    }
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let g = |e: sqlx::Error| map_sqlx("product row", e);
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id").map_err(g)?),
        category_id: CategoryId::from_uuid(row.try_get::<Uuid, _>("category_id").map_err(g)?),
        name: row.try_get("name").map_err(g)?,
        slug: row.try_get("slug").map_err(g)?,
        description: row.try_get("description").map_err(g)?,
        price: Money::new(row.try_get::<Decimal, _>("price").map_err(g)?),
        is_active: row.try_get("is_active").map_err(g)?,
        created_at: row.try_get("created_at").map_err(g)?,
    })
}

fn cart_from_row(row: &PgRow) -> Result<Cart, StoreError> {
    let g = |e: sqlx::Error| map_sqlx("cart row", e);
    Ok(Cart {
        id: CartId::from_uuid(row.try_get::<Uuid, _>("id").map_err(g)?),
        user_id: row
            .try_get::<Option<Uuid>, _>("user_id")
            .map_err(g)?
            .map(UserId::from_uuid),
        created_at: row.try_get("created_at").map_err(g)?,
        updated_at: row.try_get("updated_at").map_err(g)?,
    })
}

fn reservation_from_row(row: &PgRow) -> Result<Reservation, StoreError> {
    let g = |e: sqlx::Error| map_sqlx("reservation row", e);
    Ok(Reservation {
        id: ReservationId::from_uuid(row.try_get::<Uuid, _>("id").map_err(g)?),
        cart_id: CartId::from_uuid(row.try_get::<Uuid, _>("cart_id").map_err(g)?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id").map_err(g)?),
        stock_unit_id: row
            .try_get::<Option<Uuid>, _>("stock_unit_id")
            .map_err(g)?
            .map(StockUnitId::from_uuid),
        quantity: row.try_get::<i32, _>("quantity").map_err(g)? as u32,
        created_at: row.try_get("created_at").map_err(g)?,
    })
}

fn stock_unit_from_row(row: &PgRow) -> Result<StockUnit, StoreError> {
    let g = |e: sqlx::Error| map_sqlx("stock_unit row", e);
    Ok(StockUnit {
        id: StockUnitId::from_uuid(row.try_get::<Uuid, _>("id").map_err(g)?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id").map_err(g)?),
        size_id: SizeId::from_uuid(row.try_get::<Uuid, _>("size_id").map_err(g)?),
        available: row.try_get::<i32, _>("available").map_err(g)? as u32,
    })
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(url)
            .await
            .map_err(|e| map_sqlx("connect", e))?;
        Ok(Self { pool })
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::storage(format!("migrate: {e}")))
    }

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        let rows = sqlx::query(
            "SELECT product_id, stock_unit_id, quantity, unit_price \
             FROM order_line WHERE order_id = $1 ORDER BY line_no",
        )
        .bind(*id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("order_lines", e))?;

        let g = |e: sqlx::Error| map_sqlx("order_line row", e);
        rows.iter()
            .map(|row| {
                Ok(OrderLine {
                    product_id: ProductId::from_uuid(
                        row.try_get::<Uuid, _>("product_id").map_err(g)?,
                    ),
                    stock_unit_id: row
                        .try_get::<Option<Uuid>, _>("stock_unit_id")
                        .map_err(g)?
                        .map(StockUnitId::from_uuid),
                    quantity: row.try_get::<i32, _>("quantity").map_err(g)? as u32,
                    unit_price: Money::new(row.try_get::<Decimal, _>("unit_price").map_err(g)?),
                })
            })
            .collect()
    }

    async fn order_from_row(&self, row: &PgRow) -> Result<Order, StoreError> {
        let g = |e: sqlx::Error| map_sqlx("order row", e);
        let id = OrderId::from_uuid(row.try_get::<Uuid, _>("id").map_err(g)?);
        let status: String = row.try_get("status").map_err(g)?;
        Ok(Order {
            id,
            user_id: row
                .try_get::<Option<Uuid>, _>("user_id")
                .map_err(g)?
                .map(UserId::from_uuid),
            total: Money::new(row.try_get::<Decimal, _>("total").map_err(g)?),
            status: parse_status(&status)?,
            lines: self.order_lines(id).await?,
            created_at: row.try_get("created_at").map_err(g)?,
            updated_at: row.try_get("updated_at").map_err(g)?,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn put_category(&self, category: Category) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO category (id, name, slug) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, slug = EXCLUDED.slug",
        )
        .bind(*category.id.as_uuid())
        .bind(&category.name)
        .bind(&category.slug)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("put_category", e))?;
        Ok(())
    }

    async fn put_size(&self, size: Size) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO size (id, name) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(*size.id.as_uuid())
        .bind(&size.name)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("put_size", e))?;
        Ok(())
    }

    async fn put_product(&self, product: Product) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO product (id, category_id, name, slug, description, price, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
               category_id = EXCLUDED.category_id, name = EXCLUDED.name, \
               slug = EXCLUDED.slug, description = EXCLUDED.description, \
               price = EXCLUDED.price, is_active = EXCLUDED.is_active",
        )
        .bind(*product.id.as_uuid())
        .bind(*product.category_id.as_uuid())
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("put_product", e))?;
        Ok(())
    }

    async fn put_stock_unit(&self, unit: StockUnit) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO stock_unit (id, product_id, size_id, available) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET available = EXCLUDED.available",
        )
        .bind(*unit.id.as_uuid())
        .bind(*unit.product_id.as_uuid())
        .bind(*unit.size_id.as_uuid())
        .bind(unit.available as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("put_stock_unit", e))?;
        Ok(())
    }

    async fn remove_stock_unit(&self, id: StockUnitId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM stock_unit WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("remove_stock_unit", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query("SELECT id, name, slug FROM category ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx("categories", e))?;

        let g = |e: sqlx::Error| map_sqlx("category row", e);
        rows.iter()
            .map(|row| {
                Ok(Category {
                    id: CategoryId::from_uuid(row.try_get::<Uuid, _>("id").map_err(g)?),
                    name: row.try_get("name").map_err(g)?,
                    slug: row.try_get("slug").map_err(g)?,
                })
            })
            .collect()
    }

    async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        // ORDER BY cannot be a bind parameter; the clause is picked from a
        // closed set, never from caller input.
        let order_by = match filter.sort {
            Some(PriceSort::PriceAsc) => "p.price ASC, p.slug ASC",
            Some(PriceSort::PriceDesc) => "p.price DESC, p.slug ASC",
            None => "p.created_at DESC, p.slug ASC",
        };
        let sql = format!(
            "SELECT p.id, p.category_id, p.name, p.slug, p.description, p.price, p.is_active, p.created_at \
             FROM product p JOIN category c ON c.id = p.category_id \
             WHERE p.is_active AND ($1::text IS NULL OR c.slug = $1) \
             ORDER BY {order_by}"
        );

        let rows = sqlx::query(&sql)
            .bind(filter.category_slug.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx("products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            "SELECT id, category_id, name, slug, description, price, is_active, created_at \
             FROM product WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            "SELECT id, category_id, name, slug, description, price, is_active, created_at \
             FROM product WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("product_by_slug", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn size(&self, id: SizeId) -> Result<Option<Size>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM size WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("size", e))?;
        let g = |e: sqlx::Error| map_sqlx("size row", e);
        row.map(|row| {
            Ok(Size {
                id: SizeId::from_uuid(row.try_get::<Uuid, _>("id").map_err(g)?),
                name: row.try_get("name").map_err(g)?,
            })
        })
        .transpose()
    }

    async fn stock_unit(&self, id: StockUnitId) -> Result<Option<StockUnit>, StoreError> {
        let row = sqlx::query(
            "SELECT id, product_id, size_id, available FROM stock_unit WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("stock_unit", e))?;
        row.as_ref().map(stock_unit_from_row).transpose()
    }

    async fn stock_units_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockUnit>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, product_id, size_id, available \
             FROM stock_unit WHERE product_id = $1 ORDER BY size_id",
        )
        .bind(*product_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("stock_units_for_product", e))?;
        rows.iter().map(stock_unit_from_row).collect()
    }

    async fn debit_stock(&self, id: StockUnitId, quantity: u32) -> Result<(), StoreError> {
        if quantity == 0 {
            return Err(DomainError::validation("debit quantity must be positive").into());
        }

        // The guard in the WHERE clause makes the read-modify-write atomic;
        // two racing debits can never both pass it for the last unit.
        let result = sqlx::query(
            "UPDATE stock_unit SET available = available - $2 \
             WHERE id = $1 AND available >= $2",
        )
        .bind(*id.as_uuid())
        .bind(quantity as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("debit_stock", e))?;

        if result.rows_affected() > 0 {
            tracing::debug!(stock_unit = %id, quantity, "stock debited");
            return Ok(());
        }

        // Nothing updated: the unit is gone or short on stock.
        match self.stock_unit(id).await? {
            None => Err(DomainError::NotFound.into()),
            Some(unit) => {
                Err(DomainError::insufficient_stock(quantity, unit.available).into())
            }
        }
    }

    async fn credit_stock(&self, id: StockUnitId, quantity: u32) -> Result<(), StoreError> {
        if quantity == 0 {
            return Err(DomainError::validation("credit quantity must be positive").into());
        }

        let result = sqlx::query(
            "UPDATE stock_unit SET available = available + $2 WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .bind(quantity as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("credit_stock", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound.into());
        }
        tracing::debug!(stock_unit = %id, quantity, "stock credited");
        Ok(())
    }

    async fn find_or_create_cart(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Cart, StoreError> {
        let row = sqlx::query(
            "INSERT INTO cart (id, user_id, created_at, updated_at) VALUES ($1, $2, $3, $3) \
             ON CONFLICT (user_id) DO UPDATE SET updated_at = EXCLUDED.updated_at \
             RETURNING id, user_id, created_at, updated_at",
        )
        .bind(Uuid::now_v7())
        .bind(*user_id.as_uuid())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx("find_or_create_cart", e))?;
        cart_from_row(&row)
    }

    async fn cart_for_user(&self, user_id: UserId) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, created_at, updated_at FROM cart WHERE user_id = $1",
        )
        .bind(*user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("cart_for_user", e))?;
        row.as_ref().map(cart_from_row).transpose()
    }

    async fn insert_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO reservation (id, cart_id, product_id, stock_unit_id, quantity, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(*reservation.id.as_uuid())
        .bind(*reservation.cart_id.as_uuid())
        .bind(*reservation.product_id.as_uuid())
        .bind(reservation.stock_unit_id.map(|id| *id.as_uuid()))
        .bind(reservation.quantity as i32)
        .bind(reservation.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("insert_reservation", e))?;

        sqlx::query("UPDATE cart SET updated_at = $2 WHERE id = $1")
            .bind(*reservation.cart_id.as_uuid())
            .bind(reservation.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("insert_reservation touch", e))?;
        Ok(())
    }

    async fn reservations_for_cart(
        &self,
        cart_id: CartId,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, cart_id, product_id, stock_unit_id, quantity, created_at \
             FROM reservation WHERE cart_id = $1 ORDER BY created_at, id",
        )
        .bind(*cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("reservations_for_cart", e))?;
        rows.iter().map(reservation_from_row).collect()
    }

    async fn reservations_created_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, cart_id, product_id, stock_unit_id, quantity, created_at \
             FROM reservation WHERE created_at < $1 ORDER BY created_at, id",
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("reservations_created_before", e))?;
        rows.iter().map(reservation_from_row).collect()
    }

    async fn remove_reservation(&self, id: ReservationId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM reservation WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("remove_reservation", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn place_order(&self, order: Order, cart_id: CartId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx("place_order begin", e))?;

        sqlx::query(
            "INSERT INTO orders (id, user_id, total, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(*order.id.as_uuid())
        .bind(order.user_id.map(|id| *id.as_uuid()))
        .bind(order.total.amount())
        .bind(status_text(order.status))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx("place_order insert", e))?;

        for (line_no, line) in order.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_line (order_id, line_no, product_id, stock_unit_id, quantity, unit_price) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(*order.id.as_uuid())
            .bind(line_no as i32)
            .bind(*line.product_id.as_uuid())
            .bind(line.stock_unit_id.map(|id| *id.as_uuid()))
            .bind(line.quantity as i32)
            .bind(line.unit_price.amount())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx("place_order line", e))?;
        }

        sqlx::query("DELETE FROM reservation WHERE cart_id = $1")
            .bind(*cart_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx("place_order clear cart", e))?;

        sqlx::query("UPDATE cart SET updated_at = $2 WHERE id = $1")
            .bind(*cart_id.as_uuid())
            .bind(order.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx("place_order touch cart", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx("place_order commit", e))
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, total, status, created_at, updated_at \
             FROM orders WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("order", e))?;

        match row {
            Some(row) => Ok(Some(self.order_from_row(&row).await?)),
            None => Ok(None),
        }
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if !OrderStatus::PendingTransfer.can_transition_to(next) {
            return Err(DomainError::validation(format!(
                "cannot move order to {next:?}"
            ))
            .into());
        }

        let result = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = $3 \
             WHERE id = $1 AND status = 'pending_transfer'",
        )
        .bind(*id.as_uuid())
        .bind(status_text(next))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("update_order_status", e))?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        match self.order(id).await? {
            None => Err(DomainError::NotFound.into()),
            Some(order) => Err(DomainError::validation(format!(
                "cannot move order from {:?} to {next:?}",
                order.status
            ))
            .into()),
        }
    }
}
