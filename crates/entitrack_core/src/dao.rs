//! Data-access contract consumed by repositories and change trackers.
//!
//! A data-access object (DAO) is the only place that talks to the backing
//! store. It is owned by the caller and injected; the core never creates or
//! closes connections.
//!
//! # Capabilities
//!
//! Not every store can create, update and delete every entity type. A DAO
//! declares what it supports through [`Capabilities`]; a save consults the
//! capability set before touching the pending partition of each operation.

use crate::entity::{EntityKey, Record};
use crate::error::{DaoError, DaoResult};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// A deferred single-entity query.
pub type SingleSelector<'a, R> = Pin<Box<dyn Future<Output = DaoResult<Option<R>>> + Send + 'a>>;

/// A deferred multi-entity query.
pub type ManySelector<'a, R> = Pin<Box<dyn Future<Output = DaoResult<Vec<R>>> + Send + 'a>>;

/// A persistence operation issued while saving changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Insert a new record.
    Create,
    /// Update an existing record.
    Update,
    /// Delete a record.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// The set of persistence operations a DAO supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    create: bool,
    update: bool,
    delete: bool,
}

impl Capabilities {
    /// Every operation is supported.
    pub const ALL: Self = Self {
        create: true,
        update: true,
        delete: true,
    };

    /// No operation is supported.
    pub const READ_ONLY: Self = Self {
        create: false,
        update: false,
        delete: false,
    };

    /// Returns a copy with `operation` supported.
    #[must_use]
    pub const fn with(mut self, operation: Operation) -> Self {
        match operation {
            Operation::Create => self.create = true,
            Operation::Update => self.update = true,
            Operation::Delete => self.delete = true,
        }
        self
    }

    /// Returns a copy with `operation` unsupported.
    #[must_use]
    pub const fn without(mut self, operation: Operation) -> Self {
        match operation {
            Operation::Create => self.create = false,
            Operation::Update => self.update = false,
            Operation::Delete => self.delete = false,
        }
        self
    }

    /// Returns true if `operation` is supported.
    #[must_use]
    pub const fn supports(self, operation: Operation) -> bool {
        match operation {
            Operation::Create => self.create,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ALL
    }
}

/// Read access to one entity type.
#[async_trait]
pub trait ReadDao<R: Record>: Send + Sync {
    /// Loads the record with the given identity.
    async fn select_one(&self, key: &EntityKey) -> DaoResult<Option<R>>;

    /// Loads every record visible to this DAO.
    async fn select_all(&self) -> DaoResult<Vec<R>>;
}

/// Read and write access to one entity type.
///
/// Implementors override the mutators they support and report them in
/// [`Dao::capabilities`]. The default bodies fail with
/// [`DaoError::Unsupported`].
#[async_trait]
pub trait Dao<R: Record>: ReadDao<R> {
    /// Returns the supported persistence operations.
    fn capabilities(&self) -> Capabilities;

    /// Inserts a record.
    async fn create(&self, _record: &R) -> DaoResult<()> {
        Err(DaoError::unsupported(Operation::Create))
    }

    /// Updates a record.
    async fn update(&self, _record: &R) -> DaoResult<()> {
        Err(DaoError::unsupported(Operation::Update))
    }

    /// Deletes a record.
    async fn delete(&self, _record: &R) -> DaoResult<()> {
        Err(DaoError::unsupported(Operation::Delete))
    }
}

/// Issues one persistence call.
pub(crate) async fn persist<R: Record>(
    dao: &dyn Dao<R>,
    operation: Operation,
    record: &R,
) -> DaoResult<()> {
    match operation {
        Operation::Create => dao.create(record).await,
        Operation::Update => dao.update(record).await,
        Operation::Delete => dao.delete(record).await,
    }
}
