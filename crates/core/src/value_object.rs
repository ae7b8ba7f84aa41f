//! Value objects: compared by content, never mutated in place.

/// Marker for types whose identity is their content.
///
/// Two `Money` values with the same minor units and currency are the same
/// amount; there is no id to tell them apart. Changing one means building a
/// new value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
