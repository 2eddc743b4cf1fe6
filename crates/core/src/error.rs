//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a deterministic business failure that a caller can
/// surface to the user or retry; nothing here is fatal to the process.
/// Infrastructure concerns (storage failures) belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A requested stock debit exceeds what is available. No state change.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    /// No concrete stock unit (size) was chosen for a reservation.
    #[error("no stock unit selected")]
    InvalidSelection,

    /// Checkout attempted with no cart or an empty cart.
    #[error("cart is empty or its reservations expired")]
    EmptyCart,

    /// Reservation or checkout requires an authenticated user.
    #[error("unauthenticated")]
    Unauthenticated,

    /// A referenced record no longer exists.
    #[error("not found")]
    NotFound,

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    pub fn insufficient_stock(requested: u32, available: u32) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
