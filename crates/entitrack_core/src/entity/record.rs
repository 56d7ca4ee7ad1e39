//! The typed field contract every entity kind implements.

use crate::entity::EntityKey;
use std::fmt;
use std::hash::Hash;

/// A plain data record that can be tracked by an [`Entity`](super::Entity).
///
/// Field writes are expressed as tagged `Change` values ("set field X to
/// value V"), so the dirty-tracking rule can compare, record and restore any
/// field without knowing the record's layout.
///
/// # Invariants
///
/// - `read(field_of(&c))` returns a change for the same field as `c`
/// - `write(c)` followed by `read(field_of(&c))` returns a value equal to `c`
/// - `key()` depends only on fields that are never written through `write`
///
/// # Example
///
/// ```rust
/// use entitrack_core::{EntityKey, Record};
///
/// #[derive(Debug, Clone)]
/// struct Group {
///     id: String,
///     name: String,
/// }
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum GroupField {
///     Name,
/// }
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum GroupChange {
///     Name(String),
/// }
///
/// impl Record for Group {
///     type Field = GroupField;
///     type Change = GroupChange;
///
///     fn key(&self) -> EntityKey {
///         EntityKey::from(self.id.as_str())
///     }
///
///     fn field_of(change: &GroupChange) -> GroupField {
///         match change {
///             GroupChange::Name(_) => GroupField::Name,
///         }
///     }
///
///     fn read(&self, field: GroupField) -> GroupChange {
///         match field {
///             GroupField::Name => GroupChange::Name(self.name.clone()),
///         }
///     }
///
///     fn write(&mut self, change: GroupChange) {
///         match change {
///             GroupChange::Name(name) => self.name = name,
///         }
///     }
/// }
/// ```
pub trait Record: Clone + Send + Sync + 'static {
    /// Names of the writable fields.
    type Field: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// A field paired with a value.
    type Change: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Returns the identity of this record.
    fn key(&self) -> EntityKey;

    /// Returns the field a change targets.
    fn field_of(change: &Self::Change) -> Self::Field;

    /// Returns the current value of `field`.
    fn read(&self, field: Self::Field) -> Self::Change;

    /// Stores the value carried by `change`.
    fn write(&mut self, change: Self::Change);
}
