//! Entity lifecycle states.

use std::fmt;

/// Lifecycle state of an entity.
///
/// ```text
///            attach                 first divergent write
/// Detached ─────────► Unchanged ─────────────────────────► Modified
///    ▲  insert            ▲   ◄───────────────────────────    │
///    │ ─────► Added       │      every field written back     │
///    │                    │                                   │
///    └── detach     Deleted ◄──────────── delete ─────────────┘
/// ```
///
/// `Unchanged` is the resting state after a successful save or a settle-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntityState {
    /// Not owned by any tracker. Field writes are not tracked.
    #[default]
    Detached,
    /// Tracked, with no pending field changes.
    Unchanged,
    /// Queued for insertion.
    Added,
    /// Tracked, with at least one field diverged from its settled value.
    Modified,
    /// Queued for deletion.
    Deleted,
}

impl EntityState {
    /// Returns true if a save would issue a persistence call for this state.
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Modified | EntityState::Deleted
        )
    }

    /// Returns true if field writes drive state transitions in this state.
    #[must_use]
    pub fn tracks_fields(self) -> bool {
        matches!(self, EntityState::Unchanged | EntityState::Modified)
    }

    /// Returns true if a settled point clears the original-values snapshot.
    pub(crate) fn settles(self) -> bool {
        matches!(
            self,
            EntityState::Detached | EntityState::Unchanged | EntityState::Added
        )
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityState::Detached => "detached",
            EntityState::Unchanged => "unchanged",
            EntityState::Added => "added",
            EntityState::Modified => "modified",
            EntityState::Deleted => "deleted",
        };
        f.write_str(name)
    }
}
