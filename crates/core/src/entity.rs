//! Entity trait: identity + continuity across state changes.
//!
//! Products, stock units, carts, reservations and orders are all entities:
//! their fields change (prices, availability, status) but the typed id is
//! what makes two states the same thing.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
