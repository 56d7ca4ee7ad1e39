//! Identity maps and change tracking.
//!
//! A [`Tracker`] holds at most one live entity per identity. A
//! [`ChangeTracker`] adds insert/delete bookkeeping on top of the same map
//! and persists the net changes through a [`Dao`](crate::Dao). A
//! [`TrackerManager`] owns the change trackers of one unit of work and fans
//! out save and cancel calls to them in creation order.

mod change;
mod identity;
mod manager;

pub use change::{ChangeTracker, ChangeTracking, SaveReport};
pub use identity::Tracker;
pub use manager::TrackerManager;
