use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tienda_carts::Reservation;
use tienda_catalog::Product;
use tienda_core::{
    DomainError, DomainResult, Entity, Money, OrderId, ProductId, StockUnitId, UserId,
};

/// Order status lifecycle. Checkout always creates `PendingTransfer`;
/// manual payment confirmation (an external collaborator) moves it on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingTransfer,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    /// Only a pending order can move, and only once.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (
                OrderStatus::PendingTransfer,
                OrderStatus::Confirmed | OrderStatus::Cancelled
            )
        )
    }
}

/// A line of a placed order.
///
/// `unit_price` is an owned copy captured at checkout; later edits to the
/// live product price never reach it. The stock unit reference is kept for
/// history even if catalog management later deletes the unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub stock_unit_id: Option<StockUnitId>,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// A placed order. Immutable after creation except for status transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Preserved even if the user is later removed.
    pub user_id: Option<UserId>,
    pub total: Money,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Promote a cart's reservations into a pending-transfer order.
    ///
    /// Each reservation becomes one line with the product's current price
    /// captured; the total is the sum of quantity × that price. Fails with
    /// [`DomainError::EmptyCart`] when there is nothing to promote;
    /// checkout never creates an empty order.
    pub fn from_reservations(
        user_id: UserId,
        items: &[(Reservation, Product)],
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        let lines: Vec<OrderLine> = items
            .iter()
            .map(|(reservation, product)| OrderLine {
                product_id: reservation.product_id,
                stock_unit_id: reservation.stock_unit_id,
                quantity: reservation.quantity,
                unit_price: product.price,
            })
            .collect();

        let total = lines.iter().map(OrderLine::line_total).sum();

        Ok(Self {
            id: OrderId::new(),
            user_id: Some(user_id),
            total,
            status: OrderStatus::PendingTransfer,
            lines,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a status transition, rejecting anything the lifecycle forbids.
    pub fn transition_to(&mut self, next: OrderStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::validation(format!(
                "cannot move order from {:?} to {next:?}",
                self.status
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &OrderId {
        &self.id
    }
}
