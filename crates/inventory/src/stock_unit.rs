use serde::{Deserialize, Serialize};

use tienda_core::{DomainError, DomainResult, Entity, ProductId, SizeId, StockUnitId};

/// One (product, size) inventory row, the unit of stock contention.
///
/// `available` is unsigned and `debit` refuses to overdraw, so the
/// non-negative invariant holds by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUnit {
    pub id: StockUnitId,
    pub product_id: ProductId,
    pub size_id: SizeId,
    pub available: u32,
}

impl StockUnit {
    pub fn new(product_id: ProductId, size_id: SizeId, available: u32) -> Self {
        Self {
            id: StockUnitId::new(),
            product_id,
            size_id,
            available,
        }
    }

    /// Remove `quantity` from availability.
    ///
    /// Fails with [`DomainError::InsufficientStock`] and leaves the unit
    /// untouched when the request exceeds what is available. A zero
    /// quantity is malformed input, not a no-op.
    pub fn debit(&mut self, quantity: u32) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::validation("debit quantity must be positive"));
        }
        if quantity > self.available {
            return Err(DomainError::insufficient_stock(quantity, self.available));
        }
        self.available -= quantity;
        Ok(())
    }

    /// Return `quantity` to availability (an expired reservation's stock).
    pub fn credit(&mut self, quantity: u32) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::validation("credit quantity must be positive"));
        }
        self.available = self.available.saturating_add(quantity);
        Ok(())
    }
}

impl Entity for StockUnit {
    type Id = StockUnitId;

    fn id(&self) -> &StockUnitId {
        &self.id
    }
}
