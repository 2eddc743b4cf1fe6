//! Value object trait: equality by value, not identity.

/// Marker trait for immutable domain values compared by their attributes.
///
/// A `Money` amount is a value object; a `Cart` with an id is an entity.
/// To "modify" a value object, construct a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
