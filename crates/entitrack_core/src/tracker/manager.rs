//! Tracker manager.

use crate::config::TrackerConfig;
use crate::dao::Dao;
use crate::entity::Record;
use crate::error::TrackResult;
use crate::observer::{TracingObserver, TransitionObserver};
use crate::tracker::{ChangeTracker, ChangeTracking, SaveReport, Tracker};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Creates and coordinates the trackers of one unit of work.
///
/// Change trackers created through [`TrackerManager::create`] are registered
/// and visited in creation order by [`save_changes`](Self::save_changes) and
/// [`cancel_changes`](Self::cancel_changes). Read-only trackers are handed
/// out but not registered: they have nothing to save or cancel.
///
/// No entity crosses trackers; there is one tracker per entity type.
pub struct TrackerManager {
    trackers: Vec<Arc<dyn ChangeTracking>>,
    config: TrackerConfig,
    observer: Arc<dyn TransitionObserver>,
}

impl TrackerManager {
    /// Creates a manager with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    /// Creates a manager whose change trackers use `config`.
    pub fn with_config(config: TrackerConfig) -> Self {
        Self {
            trackers: Vec::new(),
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Sets the observer installed into every tracker created afterwards.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Creates and registers a change tracker persisting through `dao`.
    pub fn create<R: Record>(&mut self, dao: Arc<dyn Dao<R>>) -> Arc<ChangeTracker<R>> {
        let tracker = Arc::new(ChangeTracker::with_tracker(
            dao,
            Tracker::with_observer(Arc::clone(&self.observer)),
            self.config,
        ));
        self.trackers.push(Arc::clone(&tracker) as Arc<dyn ChangeTracking>);
        tracker
    }

    /// Creates an unregistered identity map for a read-only entity type.
    #[must_use]
    pub fn create_read_only<R: Record>(&self) -> Tracker<R> {
        Tracker::with_observer(Arc::clone(&self.observer))
    }

    /// Saves every registered tracker in creation order.
    ///
    /// Each tracker's save completes before the next one starts.
    ///
    /// # Errors
    ///
    /// Stops at the first failing tracker. Trackers saved before it keep
    /// their persisted state.
    pub async fn save_changes(&self) -> TrackResult<SaveReport> {
        let mut report = SaveReport::default();
        for (index, tracker) in self.trackers.iter().enumerate() {
            let saved = tracker.save_changes().await?;
            debug!(tracker = index, persisted = saved.total(), "tracker saved");
            report.merge(saved);
        }
        Ok(report)
    }

    /// Cancels every registered tracker in creation order.
    pub fn cancel_changes(&self) {
        for tracker in &self.trackers {
            tracker.cancel_changes();
        }
    }

    /// Returns the number of registered change trackers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    /// Returns true if no change tracker is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}

impl Default for TrackerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrackerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerManager")
            .field("trackers", &self.trackers.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityState};
    use crate::testing::{CallLog, Note, NoteChange, ScriptedDao};

    #[tokio::test]
    async fn saves_trackers_in_creation_order() {
        let log = CallLog::default();
        let first = Arc::new(ScriptedDao::new().named("first").logging_to(&log));
        let second = Arc::new(ScriptedDao::new().named("second").logging_to(&log));

        let mut manager = TrackerManager::new();
        let a = manager.create::<Note>(first.clone());
        let b = manager.create::<Note>(second.clone());
        assert_eq!(manager.len(), 2);

        b.insert(&Entity::new(Note::new("1", "b"))).unwrap();
        a.insert(&Entity::new(Note::new("1", "a"))).unwrap();

        let report = manager.save_changes().await.unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(log.calls(), vec!["first: create 1", "second: create 1"]);
    }

    #[tokio::test]
    async fn failing_tracker_stops_the_fan_out() {
        let log = CallLog::default();
        let first = Arc::new(
            ScriptedDao::new()
                .named("first")
                .logging_to(&log)
                .failing_on("create 1"),
        );
        let second = Arc::new(ScriptedDao::new().named("second").logging_to(&log));

        let mut manager = TrackerManager::new();
        let a = manager.create::<Note>(first);
        let b = manager.create::<Note>(second);
        a.insert(&Entity::new(Note::new("1", "a"))).unwrap();
        let pending = Entity::new(Note::new("2", "b"));
        b.insert(&pending).unwrap();

        assert!(manager.save_changes().await.is_err());
        assert_eq!(log.calls(), vec!["first: create 1"]);
        assert_eq!(pending.state(), EntityState::Added);
    }

    #[test]
    fn cancel_reaches_every_tracker() {
        let mut manager = TrackerManager::new();
        let a = manager.create::<Note>(Arc::new(ScriptedDao::new()));
        let b = manager.create::<Note>(Arc::new(ScriptedDao::new()));

        let added = Entity::new(Note::new("1", "a"));
        a.insert(&added).unwrap();
        let modified = b.attach(Entity::new(Note::new("1", "a")));
        modified.set(NoteChange::Pinned(true));

        manager.cancel_changes();

        assert_eq!(added.state(), EntityState::Detached);
        assert_eq!(modified.state(), EntityState::Unchanged);
    }

    #[test]
    fn read_only_trackers_are_not_registered() {
        let manager = TrackerManager::new();
        let tracker = manager.create_read_only::<Note>();
        tracker.attach(Entity::new(Note::new("1", "a")));

        assert!(manager.is_empty());
        assert_eq!(tracker.len(), 1);
    }
}
