//! Tracker configuration.

/// What a save does with pending changes whose operation the data-access
/// object does not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnsupportedPolicy {
    /// Leave the whole partition pending and carry on.
    #[default]
    Skip,
    /// Fail the save before issuing any call.
    FailFast,
}

/// How `delete` treats an entity that is already queued for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Deleting again is a no-op.
    #[default]
    Lenient,
    /// Deleting again fails with `AlreadyDeleted`.
    Strict,
}

/// Configuration shared by the change trackers of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Handling of pending changes without a supporting operation.
    pub unsupported: UnsupportedPolicy,

    /// Handling of repeated deletes.
    pub delete: DeletePolicy,

    /// Whether entities deleted during a save are detached once the save
    /// completes without error.
    pub evict_deleted: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            unsupported: UnsupportedPolicy::Skip,
            delete: DeletePolicy::Lenient,
            evict_deleted: true,
        }
    }
}

impl TrackerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the unsupported-operation policy.
    #[must_use]
    pub const fn unsupported(mut self, policy: UnsupportedPolicy) -> Self {
        self.unsupported = policy;
        self
    }

    /// Sets the repeated-delete policy.
    #[must_use]
    pub const fn delete(mut self, policy: DeletePolicy) -> Self {
        self.delete = policy;
        self
    }

    /// Sets whether deleted entities are detached after a successful save.
    #[must_use]
    pub const fn evict_deleted(mut self, value: bool) -> Self {
        self.evict_deleted = value;
        self
    }

    /// Strict settings: fail fast on unsupported operations and reject
    /// repeated deletes.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            unsupported: UnsupportedPolicy::FailFast,
            delete: DeletePolicy::Strict,
            evict_deleted: true,
        }
    }
}
