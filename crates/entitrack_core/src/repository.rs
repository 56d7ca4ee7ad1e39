//! Query-facing repositories.
//!
//! Repositories load records through a DAO and register them in an identity
//! map, so every identity has one live [`Entity`] per unit of work:
//!
//! - `get` consults the identity map first and only queries on a miss.
//! - `get_all` always queries and attaches every result.
//! - `apply_single` / `apply_many` run a custom selector and attach what it
//!   returns.
//!
//! Read-write repositories add `add` and `remove`, which queue changes in
//! the underlying [`ChangeTracker`].

use crate::dao::{ManySelector, ReadDao, SingleSelector};
use crate::entity::{Entity, EntityKey, Record};
use crate::error::TrackResult;
use crate::tracker::{ChangeTracker, Tracker};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Read access to the entities of one type.
#[async_trait]
pub trait ReadOnlyRepository<R: Record>: Send + Sync {
    /// Returns the entity with this identity, loading it on an identity-map
    /// miss.
    async fn get(&self, key: &EntityKey) -> TrackResult<Option<Entity<R>>>;

    /// Loads and attaches every entity visible to the DAO.
    ///
    /// Unlike [`get`](Self::get) this always queries, and every loaded entity
    /// replaces the tracked one with the same key. Pending edits and deletes
    /// of the replaced entities are lost, so call it before making changes,
    /// or after a commit or rollback.
    async fn get_all(&self) -> TrackResult<Vec<Entity<R>>>;

    /// Runs a single-entity selector and attaches its result.
    async fn apply_single<'s>(
        &self,
        selector: SingleSelector<'s, R>,
    ) -> TrackResult<Option<Entity<R>>>;

    /// Runs a multi-entity selector and attaches every result.
    ///
    /// Results replace tracked entities with the same key, as in
    /// [`get_all`](Self::get_all).
    async fn apply_many<'s>(&self, selector: ManySelector<'s, R>) -> TrackResult<Vec<Entity<R>>>;
}

/// Read and write access to the entities of one type.
pub trait Repository<R: Record>: ReadOnlyRepository<R> {
    /// Queues `entity` for insertion.
    ///
    /// # Errors
    ///
    /// Fails with `DuplicateEntity` if its identity is already tracked.
    fn add(&self, entity: &Entity<R>) -> TrackResult<()>;

    /// Queues `entity` for deletion.
    ///
    /// # Errors
    ///
    /// Fails with `NotTracked` if its identity is not tracked.
    fn remove(&self, entity: &Entity<R>) -> TrackResult<()>;
}

/// A read-only repository over a DAO and an identity map.
pub struct QueryRepository<R: Record> {
    dao: Arc<dyn ReadDao<R>>,
    tracker: Tracker<R>,
}

impl<R: Record> QueryRepository<R> {
    /// Creates a repository reading through `dao` into `tracker`.
    pub fn new(dao: Arc<dyn ReadDao<R>>, tracker: Tracker<R>) -> Self {
        Self { dao, tracker }
    }

    /// Returns the identity map.
    #[must_use]
    pub fn tracker(&self) -> &Tracker<R> {
        &self.tracker
    }
}

#[async_trait]
impl<R: Record> ReadOnlyRepository<R> for QueryRepository<R> {
    async fn get(&self, key: &EntityKey) -> TrackResult<Option<Entity<R>>> {
        if let Some(entity) = self.tracker.get(key) {
            trace!(entity = %key, "identity map hit");
            return Ok(Some(entity));
        }
        self.apply_single(self.dao.select_one(key)).await
    }

    async fn get_all(&self) -> TrackResult<Vec<Entity<R>>> {
        self.apply_many(self.dao.select_all()).await
    }

    async fn apply_single<'s>(
        &self,
        selector: SingleSelector<'s, R>,
    ) -> TrackResult<Option<Entity<R>>> {
        let record = selector.await?;
        Ok(self.tracker.attach_if(record.map(Entity::new)))
    }

    async fn apply_many<'s>(&self, selector: ManySelector<'s, R>) -> TrackResult<Vec<Entity<R>>> {
        let records = selector.await?;
        trace!(loaded = records.len(), "attaching query results");
        Ok(records
            .into_iter()
            .map(|record| self.tracker.attach(Entity::new(record)))
            .collect())
    }
}

impl<R: Record> fmt::Debug for QueryRepository<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRepository")
            .field("tracker", &self.tracker)
            .finish()
    }
}

/// A read-write repository over a DAO and a change tracker.
///
/// Reads go through the change tracker's identity map, so loaded entities
/// are tracked for saving.
pub struct ChangeRepository<R: Record> {
    query: QueryRepository<R>,
    changes: Arc<ChangeTracker<R>>,
}

impl<R: Record> ChangeRepository<R> {
    /// Creates a repository reading through `dao` and tracking changes in
    /// `changes`.
    pub fn new(dao: Arc<dyn ReadDao<R>>, changes: Arc<ChangeTracker<R>>) -> Self {
        Self {
            query: QueryRepository::new(dao, changes.tracker().clone()),
            changes,
        }
    }

    /// Returns the change tracker.
    #[must_use]
    pub fn changes(&self) -> &ChangeTracker<R> {
        &self.changes
    }
}

#[async_trait]
impl<R: Record> ReadOnlyRepository<R> for ChangeRepository<R> {
    async fn get(&self, key: &EntityKey) -> TrackResult<Option<Entity<R>>> {
        self.query.get(key).await
    }

    async fn get_all(&self) -> TrackResult<Vec<Entity<R>>> {
        self.query.get_all().await
    }

    async fn apply_single<'s>(
        &self,
        selector: SingleSelector<'s, R>,
    ) -> TrackResult<Option<Entity<R>>> {
        self.query.apply_single(selector).await
    }

    async fn apply_many<'s>(&self, selector: ManySelector<'s, R>) -> TrackResult<Vec<Entity<R>>> {
        self.query.apply_many(selector).await
    }
}

impl<R: Record> Repository<R> for ChangeRepository<R> {
    fn add(&self, entity: &Entity<R>) -> TrackResult<()> {
        self.changes.insert(entity)
    }

    fn remove(&self, entity: &Entity<R>) -> TrackResult<()> {
        self.changes.delete(entity)
    }
}

impl<R: Record> fmt::Debug for ChangeRepository<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeRepository")
            .field("changes", &self.changes)
            .finish()
    }
}
