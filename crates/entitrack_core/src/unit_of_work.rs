//! The unit of work contract.
//!
//! A unit of work groups the repositories touched by one logical operation.
//! Implementors own a [`TrackerManager`], create their repositories'
//! change trackers through it, and expose typed repository accessors of
//! their own. `commit` and `rollback` come for free.

use crate::error::TrackResult;
use crate::tracker::{SaveReport, TrackerManager};
use async_trait::async_trait;
use tracing::{debug, info};

/// A group of repositories saved and cancelled together.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Returns the manager owning this unit's change trackers.
    fn trackers(&self) -> &TrackerManager;

    /// Persists the pending changes of every tracker, in creation order.
    ///
    /// There is no cross-tracker atomicity: trackers saved before a failure
    /// stay saved.
    async fn commit(&self) -> TrackResult<SaveReport> {
        let report = self.trackers().save_changes().await?;
        info!(
            deleted = report.deleted,
            inserted = report.inserted,
            updated = report.updated,
            "unit of work committed"
        );
        Ok(report)
    }

    /// Discards the pending changes of every tracker.
    fn rollback(&self) {
        debug!(trackers = self.trackers().len(), "unit of work rolled back");
        self.trackers().cancel_changes();
    }
}
