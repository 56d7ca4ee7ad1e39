//! Error types for EntiTrack core.

use crate::dao::Operation;
use crate::entity::EntityKey;
use thiserror::Error;

/// Result type for data-access calls.
pub type DaoResult<T> = Result<T, DaoError>;

/// Result type for tracker, repository and unit-of-work operations.
pub type TrackResult<T> = Result<T, TrackError>;

/// Errors surfaced by a data-access object.
#[derive(Debug, Error)]
pub enum DaoError {
    /// The backing store does not support this operation for the entity type.
    #[error("operation not supported: {operation}")]
    Unsupported {
        /// The unsupported operation.
        operation: Operation,
    },

    /// The backing store rejected or failed the call.
    #[error("backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// Any other error raised by the backing store.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl DaoError {
    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates an unsupported-operation error.
    pub fn unsupported(operation: Operation) -> Self {
        Self::Unsupported { operation }
    }
}

/// Errors that can occur while tracking or saving entities.
#[derive(Debug, Error)]
pub enum TrackError {
    /// An entity with the same identity is already tracked.
    #[error("entity {key} is already tracked")]
    DuplicateEntity {
        /// Identity of the rejected entity.
        key: EntityKey,
    },

    /// No entity with this identity is tracked.
    #[error("entity {key} is not tracked")]
    NotTracked {
        /// Identity that was looked up.
        key: EntityKey,
    },

    /// The entity is already queued for deletion (strict delete policy).
    #[error("entity {key} is already deleted")]
    AlreadyDeleted {
        /// Identity of the entity.
        key: EntityKey,
    },

    /// Pending changes need an operation the data-access object does not
    /// support (fail-fast policy).
    #[error("{pending} pending change(s) need unsupported operation {operation}")]
    Unsupported {
        /// The missing operation.
        operation: Operation,
        /// Number of entities waiting for it.
        pending: usize,
    },

    /// A create, update or delete call failed while saving.
    #[error("{operation} of entity {key} failed: {source}")]
    Persistence {
        /// The failing operation.
        operation: Operation,
        /// Identity of the entity being persisted.
        key: EntityKey,
        /// The data-access error, unchanged.
        #[source]
        source: DaoError,
    },

    /// A selector failed while loading entities.
    #[error("query failed: {0}")]
    Query(#[from] DaoError),
}

impl TrackError {
    /// Creates a duplicate-entity error.
    pub fn duplicate(key: EntityKey) -> Self {
        Self::DuplicateEntity { key }
    }

    /// Creates a not-tracked error.
    pub fn not_tracked(key: EntityKey) -> Self {
        Self::NotTracked { key }
    }

    /// Returns true if this error came from a create, update or delete call.
    #[must_use]
    pub fn is_persistence(&self) -> bool {
        matches!(self, TrackError::Persistence { .. })
    }

    /// Returns the identity of the entity involved, if any.
    #[must_use]
    pub fn key(&self) -> Option<&EntityKey> {
        match self {
            TrackError::DuplicateEntity { key }
            | TrackError::NotTracked { key }
            | TrackError::AlreadyDeleted { key }
            | TrackError::Persistence { key, .. } => Some(key),
            TrackError::Unsupported { .. } | TrackError::Query(_) => None,
        }
    }
}
