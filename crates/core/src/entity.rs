//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Every row the lot ledger stores is an entity, and `id()` is its table key.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
