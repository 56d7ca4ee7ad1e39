//! Shared entity handle and the field-level dirty tracking rule.

use crate::entity::{EntityKey, EntityState, Record};
use crate::observer::{TransitionEvent, TransitionKind, TransitionObserver};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A tracked record: identity, lifecycle state and pending field changes.
///
/// `Entity<R>` is a cheap, cloneable handle. Clones share the same record,
/// so the copy held by a tracker's identity map and the copy held by the
/// caller always agree.
///
/// The record is only writable through [`Entity::set`], which applies the
/// dirty tracking rule on every write:
///
/// - A write of the value already stored is a no-op.
/// - While `Unchanged` or `Modified`, the first divergence of a field records
///   its settled value as the field's original, and `Unchanged` becomes
///   `Modified`. Later divergences keep the first recorded original.
/// - Writing a field back to its recorded original removes the record; when
///   none are left the entity returns to `Unchanged`.
/// - In `Added`, `Deleted` and `Detached` writes are stored but not tracked.
///
/// # Invariants
///
/// - For tracked entities, `state() == Unchanged` iff no originals are recorded.
/// - The key never changes after construction.
pub struct Entity<R: Record> {
    shared: Arc<Shared<R>>,
}

struct Shared<R: Record> {
    key: EntityKey,
    slot: Mutex<Slot<R>>,
}

struct Slot<R: Record> {
    record: R,
    state: EntityState,
    /// Settled value of every diverged field.
    originals: HashMap<R::Field, R::Change>,
    /// Queued for insertion and never created in the store.
    unsaved: bool,
    observer: Option<Arc<dyn TransitionObserver>>,
}

impl<R: Record> Slot<R> {
    fn write(&mut self, change: R::Change) -> Vec<TransitionKind> {
        let field = R::field_of(&change);
        let current = self.record.read(field);
        if current == change {
            return Vec::new();
        }

        let mut events = Vec::new();
        if self.state.tracks_fields() {
            match self.originals.get(&field).map(|original| *original == change) {
                None => {
                    self.originals.insert(field, current);
                    events.push(TransitionKind::FieldChanged {
                        field: format!("{field:?}"),
                    });
                    if self.state == EntityState::Unchanged {
                        events.push(self.enter(EntityState::Modified));
                    }
                }
                Some(true) => {
                    self.originals.remove(&field);
                    events.push(TransitionKind::FieldReverted {
                        field: format!("{field:?}"),
                    });
                    if self.originals.is_empty() {
                        events.push(self.enter(EntityState::Unchanged));
                    }
                }
                Some(false) => {}
            }
        }

        self.record.write(change);
        events
    }

    fn enter(&mut self, to: EntityState) -> TransitionKind {
        let from = self.state;
        self.state = to;
        TransitionKind::State { from, to }
    }
}

impl<R: Record> Entity<R> {
    /// Wraps a record in a new, detached entity.
    pub fn new(record: R) -> Self {
        Self {
            shared: Arc::new(Shared {
                key: record.key(),
                slot: Mutex::new(Slot {
                    record,
                    state: EntityState::Detached,
                    originals: HashMap::new(),
                    unsaved: false,
                    observer: None,
                }),
            }),
        }
    }

    /// Returns the entity's identity.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &EntityKey {
        &self.shared.key
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EntityState {
        self.shared.slot.lock().state
    }

    /// Writes one field, applying the dirty tracking rule.
    pub fn set(&self, change: R::Change) {
        let (events, observer) = {
            let mut slot = self.shared.slot.lock();
            let events = slot.write(change);
            (events, slot.observer.clone())
        };
        self.notify(observer, events);
    }

    /// Reads from the record without cloning it.
    pub fn read<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        f(&self.shared.slot.lock().record)
    }

    /// Returns a copy of the record.
    #[must_use]
    pub fn record(&self) -> R {
        self.shared.slot.lock().record.clone()
    }

    /// Returns the current value of one field.
    #[must_use]
    pub fn get(&self, field: R::Field) -> R::Change {
        self.shared.slot.lock().record.read(field)
    }

    /// Returns the recorded original of `field`, if it has diverged.
    #[must_use]
    pub fn original(&self, field: R::Field) -> Option<R::Change> {
        self.shared.slot.lock().originals.get(&field).cloned()
    }

    /// Returns every recorded original.
    #[must_use]
    pub fn original_values(&self) -> Vec<R::Change> {
        self.shared.slot.lock().originals.values().cloned().collect()
    }

    /// Returns true if `field` has diverged from its settled value.
    #[must_use]
    pub fn is_modified(&self, field: R::Field) -> bool {
        self.shared.slot.lock().originals.contains_key(&field)
    }

    /// Returns true if at least one original is recorded.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.shared.slot.lock().originals.is_empty()
    }

    /// Writes every recorded original back onto the record.
    ///
    /// Each write goes through [`Entity::set`], so a `Modified` entity ends
    /// up `Unchanged` with no recorded originals. Calling this on an entity
    /// without pending field changes does nothing.
    pub fn cancel_changes(&self) {
        for original in self.original_values() {
            self.set(original);
        }
    }

    /// Returns true if both handles refer to the same entity.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Forces a lifecycle state.
    ///
    /// Entering `Detached`, `Unchanged` or `Added` settles the entity: the
    /// current field values become the new originals baseline.
    pub(crate) fn mark(&self, to: EntityState) {
        let (event, observer) = {
            let mut slot = self.shared.slot.lock();
            if to.settles() {
                slot.originals.clear();
            }
            if slot.state == to {
                return;
            }
            (slot.enter(to), slot.observer.clone())
        };
        self.notify(observer, vec![event]);
    }

    /// Restores every recorded original directly and settles as `Unchanged`,
    /// whatever the current state.
    pub(crate) fn revert(&self) {
        let (events, observer) = {
            let mut slot = self.shared.slot.lock();
            let Slot {
                record, originals, ..
            } = &mut *slot;
            let mut events = Vec::with_capacity(originals.len() + 1);
            for (field, original) in originals.drain() {
                record.write(original);
                events.push(TransitionKind::FieldReverted {
                    field: format!("{field:?}"),
                });
            }
            if slot.state != EntityState::Unchanged {
                events.push(slot.enter(EntityState::Unchanged));
            }
            (events, slot.observer.clone())
        };
        self.notify(observer, events);
    }

    /// Returns true if the entity was inserted and has no row in the store
    /// yet.
    pub(crate) fn is_unsaved(&self) -> bool {
        self.shared.slot.lock().unsaved
    }

    pub(crate) fn set_unsaved(&self, unsaved: bool) {
        self.shared.slot.lock().unsaved = unsaved;
    }

    /// Installs the observer of the tracker that owns this entity.
    pub(crate) fn bind(&self, observer: Option<Arc<dyn TransitionObserver>>) {
        self.shared.slot.lock().observer = observer;
    }

    fn notify(&self, observer: Option<Arc<dyn TransitionObserver>>, events: Vec<TransitionKind>) {
        let Some(observer) = observer else {
            return;
        };
        for kind in events {
            observer.on_transition(&TransitionEvent {
                key: self.shared.key.clone(),
                kind,
            });
        }
    }
}

impl<R: Record> Clone for Entity<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: Record + fmt::Debug> fmt::Debug for Entity<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.shared.slot.lock();
        f.debug_struct("Entity")
            .field("key", &self.shared.key)
            .field("state", &slot.state)
            .field("record", &slot.record)
            .field("originals", &slot.originals.len())
            .finish()
    }
}
