//! Observers for entity state transitions.
//!
//! Every state transition and every field that starts or stops diverging from
//! its settled value is reported to the [`TransitionObserver`] of the tracker
//! owning the entity. The default observer forwards events to `tracing`;
//! [`TransitionFeed`] keeps them for inspection.
//!
//! # Usage
//!
//! ```rust,ignore
//! use entitrack_core::{TrackerManager, TransitionFeed};
//! use std::sync::Arc;
//!
//! let feed = Arc::new(TransitionFeed::new());
//! let manager = TrackerManager::new().with_observer(feed.clone());
//!
//! // ... load and mutate entities ...
//!
//! for event in feed.history() {
//!     println!("{event}");
//! }
//! ```

use crate::entity::{EntityKey, EntityState};
use parking_lot::RwLock;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, trace};

/// What happened to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionKind {
    /// The entity moved between lifecycle states.
    State {
        /// State before the transition.
        from: EntityState,
        /// State after the transition.
        to: EntityState,
    },
    /// A field diverged from its settled value and its original was recorded.
    FieldChanged {
        /// Field name.
        field: String,
    },
    /// A field was written back to its recorded original.
    FieldReverted {
        /// Field name.
        field: String,
    },
}

/// A single transition of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    /// Identity of the entity.
    pub key: EntityKey,
    /// The transition.
    pub kind: TransitionKind,
}

impl TransitionEvent {
    /// Creates a state transition event.
    pub fn state(key: EntityKey, from: EntityState, to: EntityState) -> Self {
        Self {
            key,
            kind: TransitionKind::State { from, to },
        }
    }

    /// Returns the target state if this is a state transition.
    #[must_use]
    pub fn target_state(&self) -> Option<EntityState> {
        match self.kind {
            TransitionKind::State { to, .. } => Some(to),
            _ => None,
        }
    }
}

impl fmt::Display for TransitionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TransitionKind::State { from, to } => {
                write!(f, "entity {}: {from} -> {to}", self.key)
            }
            TransitionKind::FieldChanged { field } => {
                write!(f, "entity {}: field `{field}` changed", self.key)
            }
            TransitionKind::FieldReverted { field } => {
                write!(f, "entity {}: field `{field}` back to original", self.key)
            }
        }
    }
}

/// Receives entity transitions.
///
/// Observers are called synchronously on the task performing the write, after
/// the entity's own lock has been released. They must not block.
pub trait TransitionObserver: Send + Sync {
    /// Called once per transition.
    fn on_transition(&self, event: &TransitionEvent);
}

/// Forwards transitions to `tracing`.
///
/// State changes are emitted at `DEBUG`, field-level events at `TRACE`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TransitionObserver for TracingObserver {
    fn on_transition(&self, event: &TransitionEvent) {
        match &event.kind {
            TransitionKind::State { from, to } => {
                debug!(entity = %event.key, %from, %to, "entity state changed");
            }
            TransitionKind::FieldChanged { field } => {
                trace!(entity = %event.key, field = %field, "entity field changed");
            }
            TransitionKind::FieldReverted { field } => {
                trace!(entity = %event.key, field = %field, "entity field back to original");
            }
        }
    }
}

/// Discards every transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TransitionObserver for NoopObserver {
    fn on_transition(&self, _event: &TransitionEvent) {}
}

/// An observer that distributes transitions to subscribers and keeps a
/// bounded history.
///
/// The feed:
/// - Preserves emission order
/// - Supports multiple subscribers
/// - Drops subscribers whose receiver was dropped
pub struct TransitionFeed {
    /// Subscribers (senders).
    subscribers: RwLock<Vec<Sender<TransitionEvent>>>,
    /// Recent events, oldest first.
    history: RwLock<Vec<TransitionEvent>>,
    /// Maximum history size.
    max_history: usize,
}

impl TransitionFeed {
    /// Creates a new feed.
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    /// Creates a feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            max_history,
        }
    }

    /// Subscribes to the feed.
    ///
    /// Returns a receiver that will receive all future events.
    pub fn subscribe(&self) -> Receiver<TransitionEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Returns a copy of the retained history.
    pub fn history(&self) -> Vec<TransitionEvent> {
        self.history.read().clone()
    }

    /// Returns the retained events for one entity.
    pub fn events_for(&self, key: &EntityKey) -> Vec<TransitionEvent> {
        self.history
            .read()
            .iter()
            .filter(|e| &e.key == key)
            .cloned()
            .collect()
    }

    /// Returns the sequence of states one entity moved into.
    pub fn states_of(&self, key: &EntityKey) -> Vec<EntityState> {
        self.history
            .read()
            .iter()
            .filter(|e| &e.key == key)
            .filter_map(TransitionEvent::target_state)
            .collect()
    }

    /// Returns the number of events in history.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Clears the history.
    pub fn clear(&self) {
        self.history.write().clear();
    }
}

impl Default for TransitionFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionObserver for TransitionFeed {
    fn on_transition(&self, event: &TransitionEvent) {
        {
            let mut history = self.history.write();
            history.push(event.clone());
            if history.len() > self.max_history {
                let to_remove = history.len() - self.max_history;
                history.drain(0..to_remove);
            }
        }

        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn modified(key: &str) -> TransitionEvent {
        TransitionEvent::state(
            EntityKey::from(key),
            EntityState::Unchanged,
            EntityState::Modified,
        )
    }

    #[test]
    fn emit_and_receive() {
        let feed = TransitionFeed::new();
        let rx = feed.subscribe();

        let event = modified("1");
        feed.on_transition(&event);

        let received = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received, event);
    }

    #[test]
    fn dropped_subscriber_is_removed() {
        let feed = TransitionFeed::new();
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);
        feed.on_transition(&modified("1"));
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn history_is_bounded() {
        let feed = TransitionFeed::with_max_history(2);
        for key in ["1", "2", "3"] {
            feed.on_transition(&modified(key));
        }

        let history = feed.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].key, EntityKey::from("2"));
    }

    #[test]
    fn states_of_filters_by_key() {
        let feed = TransitionFeed::new();
        feed.on_transition(&modified("1"));
        feed.on_transition(&TransitionEvent {
            key: EntityKey::from("1"),
            kind: TransitionKind::FieldChanged {
                field: "Title".into(),
            },
        });
        feed.on_transition(&modified("2"));

        assert_eq!(
            feed.states_of(&EntityKey::from("1")),
            vec![EntityState::Modified]
        );
        assert_eq!(feed.events_for(&EntityKey::from("1")).len(), 2);
    }

    #[test]
    fn clear_empties_history() {
        let feed = TransitionFeed::new();
        feed.on_transition(&modified("1"));
        feed.on_transition(&modified("2"));
        assert_eq!(feed.history_len(), 2);

        feed.clear();

        assert_eq!(feed.history_len(), 0);
        assert!(feed.states_of(&EntityKey::from("1")).is_empty());
    }

    #[test]
    fn noop_observer_accepts_events() {
        let observer: Arc<dyn TransitionObserver> = Arc::new(NoopObserver);
        observer.on_transition(&modified("1"));
    }

    #[test]
    fn display_mentions_states() {
        let text = modified("7").to_string();
        assert_eq!(text, "entity 7: unchanged -> modified");
    }
}
