//! Change tracker: insert/delete bookkeeping and saving of net changes.

use crate::config::{DeletePolicy, TrackerConfig, UnsupportedPolicy};
use crate::dao::{persist, Capabilities, Dao, Operation};
use crate::entity::{Entity, EntityState, Record};
use crate::error::{TrackError, TrackResult};
use crate::tracker::Tracker;
use async_trait::async_trait;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, warn};

/// Counts of what one save issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Entities deleted.
    pub deleted: usize,
    /// Entities inserted.
    pub inserted: usize,
    /// Entities updated.
    pub updated: usize,
    /// Operations whose pending partition was left untouched because the
    /// DAO does not support them.
    pub skipped: Vec<Operation>,
}

impl SaveReport {
    /// Returns the number of persistence calls that succeeded.
    #[must_use]
    pub fn total(&self) -> usize {
        self.deleted + self.inserted + self.updated
    }

    /// Returns true if nothing was persisted or skipped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0 && self.skipped.is_empty()
    }

    /// Adds another report's counts to this one.
    pub fn merge(&mut self, other: SaveReport) {
        self.deleted += other.deleted;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped.extend(other.skipped);
    }

    fn record(&mut self, operation: Operation) {
        match operation {
            Operation::Create => self.inserted += 1,
            Operation::Update => self.updated += 1,
            Operation::Delete => self.deleted += 1,
        }
    }
}

/// Type-erased save/cancel interface of a change tracker.
///
/// This is what a [`TrackerManager`](crate::TrackerManager) holds, so one
/// unit of work can coordinate trackers of different entity types.
#[async_trait]
pub trait ChangeTracking: Send + Sync {
    /// Persists every pending change.
    async fn save_changes(&self) -> TrackResult<SaveReport>;

    /// Discards every pending change in memory.
    fn cancel_changes(&self);
}

/// An identity map that also records inserts and deletes and persists the
/// net changes of its entities.
///
/// Dereferences to the underlying [`Tracker`], which it shares with the
/// repository reading through it.
///
/// # Invariants
///
/// - Every tracked entity is `Unchanged`, `Added`, `Modified` or `Deleted`.
/// - A save issues deletes, then inserts, then updates, one entity at a time.
pub struct ChangeTracker<R: Record> {
    tracker: Tracker<R>,
    dao: Arc<dyn Dao<R>>,
    config: TrackerConfig,
}

impl<R: Record> ChangeTracker<R> {
    /// Creates a change tracker that persists through `dao`.
    pub fn new(dao: Arc<dyn Dao<R>>) -> Self {
        Self::with_tracker(dao, Tracker::new(), TrackerConfig::default())
    }

    /// Creates a change tracker over an existing identity map.
    pub fn with_tracker(dao: Arc<dyn Dao<R>>, tracker: Tracker<R>, config: TrackerConfig) -> Self {
        Self {
            tracker,
            dao,
            config,
        }
    }

    /// Returns the underlying identity map.
    #[must_use]
    pub fn tracker(&self) -> &Tracker<R> {
        &self.tracker
    }

    /// Queues `entity` for insertion.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::DuplicateEntity`] if its key is already tracked.
    pub fn insert(&self, entity: &Entity<R>) -> TrackResult<()> {
        if !self.tracker.try_track(entity) {
            return Err(TrackError::duplicate(entity.key().clone()));
        }
        entity.bind(Some(self.tracker.observer()));
        entity.set_unsaved(true);
        entity.mark(EntityState::Added);
        debug!(entity = %entity.key(), "entity queued for insert");
        Ok(())
    }

    /// Queues the tracked entity with the same key as `entity` for deletion.
    ///
    /// The entity stays tracked until the next save. Deleting an entity that
    /// is still `Added` is allowed; since it was never created, the next save
    /// or cancel detaches it without calling the DAO.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::NotTracked`] if the key is not tracked, and
    /// [`TrackError::AlreadyDeleted`] for a repeated delete under
    /// [`DeletePolicy::Strict`].
    pub fn delete(&self, entity: &Entity<R>) -> TrackResult<()> {
        let tracked = self
            .tracker
            .get(entity.key())
            .ok_or_else(|| TrackError::not_tracked(entity.key().clone()))?;

        if tracked.state() == EntityState::Deleted {
            return match self.config.delete {
                DeletePolicy::Lenient => Ok(()),
                DeletePolicy::Strict => Err(TrackError::AlreadyDeleted {
                    key: entity.key().clone(),
                }),
            };
        }

        tracked.mark(EntityState::Deleted);
        debug!(entity = %entity.key(), "entity queued for delete");
        Ok(())
    }

    /// Persists every pending change.
    ///
    /// Deleted entities are deleted first, then added entities are created,
    /// then modified entities are updated. Each call is awaited before the
    /// next one is issued. Created and updated entities become `Unchanged`;
    /// deleted entities stay `Deleted` for the rest of the save and are
    /// detached once it completes if `evict_deleted` is set.
    ///
    /// A partition whose operation the DAO does not support is skipped, or
    /// fails the save up front under [`UnsupportedPolicy::FailFast`].
    ///
    /// # Errors
    ///
    /// The first failing call aborts the save with
    /// [`TrackError::Persistence`]. Entities persisted before it keep their
    /// new state; nothing is compensated.
    pub async fn save_changes(&self) -> TrackResult<SaveReport> {
        let discarded = self.discard_unsaved_deletes();
        if discarded > 0 {
            debug!(discarded, "unsaved deletes discarded");
        }

        let entities = self.tracker.entities();
        let partitions = [
            (Operation::Delete, select(&entities, EntityState::Deleted)),
            (Operation::Create, select(&entities, EntityState::Added)),
            (Operation::Update, select(&entities, EntityState::Modified)),
        ];

        let capabilities = self.dao.capabilities();
        if self.config.unsupported == UnsupportedPolicy::FailFast {
            check_supported(capabilities, &partitions)?;
        }

        let mut report = SaveReport::default();
        let mut deleted = Vec::new();
        for (operation, pending) in partitions {
            if pending.is_empty() {
                continue;
            }
            if !capabilities.supports(operation) {
                debug!(%operation, pending = pending.len(), "operation unsupported, skipping");
                report.skipped.push(operation);
                continue;
            }

            debug!(%operation, pending = pending.len(), "saving partition");
            for entity in pending {
                let record = entity.record();
                if let Err(source) = persist(self.dao.as_ref(), operation, &record).await {
                    warn!(entity = %entity.key(), %operation, error = %source, "save aborted");
                    return Err(TrackError::Persistence {
                        operation,
                        key: entity.key().clone(),
                        source,
                    });
                }

                report.record(operation);
                match operation {
                    Operation::Delete => {
                        entity.mark(EntityState::Deleted);
                        deleted.push(entity);
                    }
                    Operation::Create => {
                        entity.set_unsaved(false);
                        entity.mark(EntityState::Unchanged);
                    }
                    Operation::Update => entity.mark(EntityState::Unchanged),
                }
            }
        }

        if self.config.evict_deleted {
            for entity in &deleted {
                self.tracker.detach(entity);
            }
        }

        debug!(
            deleted = report.deleted,
            inserted = report.inserted,
            updated = report.updated,
            "changes saved"
        );
        Ok(report)
    }

    /// Discards every pending change in memory.
    ///
    /// Deleted entities return to `Unchanged` with their field changes rolled
    /// back, added entities are detached, and modified entities have their
    /// recorded originals written back. A deleted entity that was inserted
    /// and never created is detached like an added one.
    pub fn cancel_changes(&self) {
        let mut cancelled = self.discard_unsaved_deletes();
        let entities = self.tracker.entities();

        for entity in select(&entities, EntityState::Deleted) {
            entity.revert();
            cancelled += 1;
        }
        for entity in select(&entities, EntityState::Added) {
            self.tracker.detach(&entity);
            cancelled += 1;
        }
        for entity in select(&entities, EntityState::Modified) {
            entity.cancel_changes();
            cancelled += 1;
        }

        debug!(cancelled, "changes cancelled");
    }

    /// Detaches deleted entities that never reached the store.
    fn discard_unsaved_deletes(&self) -> usize {
        let mut discarded = 0;
        for entity in self.tracker.in_state(EntityState::Deleted) {
            if entity.is_unsaved() {
                self.tracker.detach(&entity);
                discarded += 1;
            }
        }
        discarded
    }
}

#[async_trait]
impl<R: Record> ChangeTracking for ChangeTracker<R> {
    async fn save_changes(&self) -> TrackResult<SaveReport> {
        ChangeTracker::save_changes(self).await
    }

    fn cancel_changes(&self) {
        ChangeTracker::cancel_changes(self);
    }
}

impl<R: Record> Deref for ChangeTracker<R> {
    type Target = Tracker<R>;

    fn deref(&self) -> &Self::Target {
        &self.tracker
    }
}

impl<R: Record> fmt::Debug for ChangeTracker<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("entities", &self.tracker.len())
            .field("capabilities", &self.dao.capabilities())
            .field("config", &self.config)
            .finish()
    }
}

fn select<R: Record>(entities: &[Entity<R>], state: EntityState) -> Vec<Entity<R>> {
    entities
        .iter()
        .filter(|e| e.state() == state)
        .cloned()
        .collect()
}

fn check_supported<R: Record>(
    capabilities: Capabilities,
    partitions: &[(Operation, Vec<Entity<R>>)],
) -> TrackResult<()> {
    for (operation, pending) in partitions {
        if !pending.is_empty() && !capabilities.supports(*operation) {
            return Err(TrackError::Unsupported {
                operation: *operation,
                pending: pending.len(),
            });
        }
    }
    Ok(())
}
