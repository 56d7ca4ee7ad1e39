//! Identity map.

use crate::entity::{Entity, EntityKey, EntityState, Record};
use crate::observer::{TracingObserver, TransitionObserver};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An identity map: at most one live entity per key.
///
/// `Tracker` is a cheap, cloneable handle; clones share the same map. Read
/// paths use it to avoid loading the same identity twice. It owns no
/// persistence logic and never fails: attaching over an existing identity
/// replaces it, and detaching an untracked entity does nothing.
pub struct Tracker<R: Record> {
    shared: Arc<Shared<R>>,
}

struct Shared<R: Record> {
    entities: RwLock<HashMap<EntityKey, Entity<R>>>,
    observer: Arc<dyn TransitionObserver>,
}

impl<R: Record> Tracker<R> {
    /// Creates an empty tracker that reports transitions to `tracing`.
    pub fn new() -> Self {
        Self::with_observer(Arc::new(TracingObserver))
    }

    /// Creates an empty tracker with a custom transition observer.
    pub fn with_observer(observer: Arc<dyn TransitionObserver>) -> Self {
        Self {
            shared: Arc::new(Shared {
                entities: RwLock::new(HashMap::new()),
                observer,
            }),
        }
    }

    /// Tracks `entity` as `Unchanged`, replacing any entity with the same key.
    ///
    /// Use it for entities that come from the store. The replaced entity is
    /// dropped from the map together with its pending state: if it was
    /// `Modified` or `Deleted`, that change is no longer saved.
    pub fn attach(&self, entity: Entity<R>) -> Entity<R> {
        entity.bind(Some(Arc::clone(&self.shared.observer)));
        entity.set_unsaved(false);
        self.shared
            .entities
            .write()
            .insert(entity.key().clone(), entity.clone());
        entity.mark(EntityState::Unchanged);
        entity
    }

    /// Attaches `entity` if there is one.
    pub fn attach_if(&self, entity: Option<Entity<R>>) -> Option<Entity<R>> {
        entity.map(|e| self.attach(e))
    }

    /// Stops tracking the entity with the same key as `entity` and marks it
    /// `Detached`.
    ///
    /// Returns false, without touching `entity`, if nothing was tracked under
    /// its key.
    pub fn detach(&self, entity: &Entity<R>) -> bool {
        let removed = self.shared.entities.write().remove(entity.key());
        let Some(tracked) = removed else {
            return false;
        };

        tracked.mark(EntityState::Detached);
        tracked.bind(None);
        if !tracked.ptr_eq(entity) {
            entity.mark(EntityState::Detached);
        }
        true
    }

    /// Returns the tracked entity with this key.
    #[must_use]
    pub fn get(&self, key: &EntityKey) -> Option<Entity<R>> {
        self.shared.entities.read().get(key).cloned()
    }

    /// Returns true if an entity with this key is tracked.
    #[must_use]
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.shared.entities.read().contains_key(key)
    }

    /// Returns every tracked entity, in no particular order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity<R>> {
        self.shared.entities.read().values().cloned().collect()
    }

    /// Returns the tracked entities in `state`.
    #[must_use]
    pub fn in_state(&self, state: EntityState) -> Vec<Entity<R>> {
        self.shared
            .entities
            .read()
            .values()
            .filter(|e| e.state() == state)
            .cloned()
            .collect()
    }

    /// Returns the number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.entities.read().len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.entities.read().is_empty()
    }

    /// Returns the observer installed into tracked entities.
    pub(crate) fn observer(&self) -> Arc<dyn TransitionObserver> {
        Arc::clone(&self.shared.observer)
    }

    /// Tracks `entity` unless its key is taken. Returns false if it was.
    pub(crate) fn try_track(&self, entity: &Entity<R>) -> bool {
        let mut entities = self.shared.entities.write();
        if entities.contains_key(entity.key()) {
            return false;
        }
        entities.insert(entity.key().clone(), entity.clone());
        true
    }
}

impl<R: Record> Default for Tracker<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Clone for Tracker<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: Record> fmt::Debug for Tracker<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("entities", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::TransitionFeed;
    use crate::testing::{Note, NoteChange};

    #[test]
    fn attach_marks_unchanged() {
        let tracker = Tracker::new();
        let entity = tracker.attach(Entity::new(Note::new("1", "a")));

        assert_eq!(entity.state(), EntityState::Unchanged);
        assert!(tracker.get(&EntityKey::from("1")).unwrap().ptr_eq(&entity));
    }

    #[test]
    fn attach_overwrites_same_identity() {
        let tracker = Tracker::new();
        let first = tracker.attach(Entity::new(Note::new("1", "a")));
        let second = tracker.attach(Entity::new(Note::new("1", "b")));

        assert_eq!(tracker.len(), 1);
        let tracked = tracker.get(first.key()).unwrap();
        assert!(tracked.ptr_eq(&second));
        assert!(!tracked.ptr_eq(&first));
    }

    #[test]
    fn attach_over_pending_entity_drops_its_change() {
        let tracker = Tracker::new();
        let edited = tracker.attach(Entity::new(Note::new("1", "a")));
        edited.set(NoteChange::Title("b".into()));

        let reloaded = tracker.attach(Entity::new(Note::new("1", "a")));

        assert!(tracker.in_state(EntityState::Modified).is_empty());
        assert_eq!(reloaded.state(), EntityState::Unchanged);
        assert_eq!(edited.state(), EntityState::Modified);
    }

    #[test]
    fn attach_if_none_is_none() {
        let tracker: Tracker<Note> = Tracker::new();
        assert!(tracker.attach_if(None).is_none());
        assert!(tracker.is_empty());

        let attached = tracker.attach_if(Some(Entity::new(Note::new("1", "a"))));
        assert_eq!(attached.unwrap().state(), EntityState::Unchanged);
    }

    #[test]
    fn attach_settles_pending_changes() {
        let tracker = Tracker::new();
        let entity = tracker.attach(Entity::new(Note::new("1", "a")));
        entity.set(NoteChange::Title("b".into()));
        assert_eq!(entity.state(), EntityState::Modified);

        tracker.attach(entity.clone());
        assert_eq!(entity.state(), EntityState::Unchanged);
        assert!(!entity.has_changes());
    }

    #[test]
    fn detach_removes_and_marks_detached() {
        let tracker = Tracker::new();
        let entity = tracker.attach(Entity::new(Note::new("1", "a")));

        assert!(tracker.detach(&entity));
        assert_eq!(entity.state(), EntityState::Detached);
        assert!(!tracker.contains(entity.key()));

        entity.set(NoteChange::Title("b".into()));
        assert_eq!(entity.state(), EntityState::Detached);
    }

    #[test]
    fn detach_untracked_is_a_no_op() {
        let tracker = Tracker::new();
        let entity = Entity::new(Note::new("1", "a"));
        assert!(!tracker.detach(&entity));
        assert_eq!(entity.state(), EntityState::Detached);
    }

    #[test]
    fn get_has_no_side_effects() {
        let tracker = Tracker::new();
        let entity = tracker.attach(Entity::new(Note::new("1", "a")));
        entity.set(NoteChange::Pinned(true));

        let found = tracker.get(entity.key()).unwrap();
        assert_eq!(found.state(), EntityState::Modified);
        assert!(tracker.get(&EntityKey::from("2")).is_none());
    }

    #[test]
    fn attached_entities_report_to_tracker_observer() {
        let feed = Arc::new(TransitionFeed::new());
        let tracker = Tracker::with_observer(feed.clone());
        let entity = tracker.attach(Entity::new(Note::new("1", "a")));
        entity.set(NoteChange::Title("b".into()));

        assert_eq!(
            feed.states_of(entity.key()),
            vec![EntityState::Unchanged, EntityState::Modified]
        );
    }

    #[test]
    fn in_state_filters() {
        let tracker = Tracker::new();
        let a = tracker.attach(Entity::new(Note::new("1", "a")));
        tracker.attach(Entity::new(Note::new("2", "b")));
        a.set(NoteChange::Pinned(true));

        assert_eq!(tracker.in_state(EntityState::Modified).len(), 1);
        assert_eq!(tracker.in_state(EntityState::Unchanged).len(), 1);
    }
}
