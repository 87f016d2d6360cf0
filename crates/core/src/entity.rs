//! Identity of domain records.

/// A record with a stable identifier.
///
/// Line items, tax tables and invoices are entities: two records with the same
/// identifier describe the same thing, even if their computed fields differ.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
