//! # EntiTrack Core
//!
//! Unit of work, identity map and field-level dirty tracking for
//! repository-style data access.
//!
//! This crate provides:
//! - [`Entity`] handles with a lifecycle state machine and a snapshot of
//!   original field values
//! - [`Tracker`] identity maps and [`ChangeTracker`]s that persist net
//!   changes through a [`Dao`]
//! - [`ReadOnlyRepository`] and [`Repository`] facades
//! - [`TrackerManager`] and the [`UnitOfWork`] contract tying trackers
//!   into one commit or rollback
//!
//! ## Entity Lifecycle
//!
//! ```text
//! Detached --attach--> Unchanged --set--> Modified --revert all--> Unchanged
//! Detached --insert--> Added --save--> Unchanged
//! Unchanged/Modified --delete--> Deleted --save--> evicted
//! ```
//!
//! ## Key Invariants
//!
//! - One live entity per identity per tracker
//! - A tracked entity is `Unchanged` iff it has no recorded originals
//! - Saves issue deletes, then inserts, then updates
//! - Entity state only changes after the DAO call succeeds
//!
//! ## Usage
//!
//! ```
//! use entitrack_core::{Entity, EntityKey, EntityState, Record, Tracker};
//!
//! #[derive(Clone)]
//! struct Tag { id: String, label: String }
//!
//! #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
//! enum TagField { Label }
//!
//! #[derive(Clone, PartialEq, Debug)]
//! enum TagChange { Label(String) }
//!
//! impl Record for Tag {
//!     type Field = TagField;
//!     type Change = TagChange;
//!
//!     fn key(&self) -> EntityKey { EntityKey::new(self.id.clone()) }
//!     fn field_of(_: &TagChange) -> TagField { TagField::Label }
//!     fn read(&self, _: TagField) -> TagChange { TagChange::Label(self.label.clone()) }
//!     fn write(&mut self, change: TagChange) {
//!         let TagChange::Label(label) = change;
//!         self.label = label;
//!     }
//! }
//!
//! let tracker = Tracker::new();
//! let tag = tracker.attach(Entity::new(Tag { id: "1".into(), label: "a".into() }));
//!
//! tag.set(TagChange::Label("b".into()));
//! assert_eq!(tag.state(), EntityState::Modified);
//!
//! tag.set(TagChange::Label("a".into()));
//! assert_eq!(tag.state(), EntityState::Unchanged);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dao;
mod entity;
mod error;
mod observer;
mod repository;
mod tracker;
mod unit_of_work;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{DeletePolicy, TrackerConfig, UnsupportedPolicy};
pub use dao::{Capabilities, Dao, ManySelector, Operation, ReadDao, SingleSelector};
pub use entity::{Entity, EntityKey, EntityState, Record};
pub use error::{DaoError, DaoResult, TrackError, TrackResult};
pub use observer::{
    NoopObserver, TracingObserver, TransitionEvent, TransitionFeed, TransitionKind,
    TransitionObserver,
};
pub use repository::{ChangeRepository, QueryRepository, ReadOnlyRepository, Repository};
pub use tracker::{ChangeTracker, ChangeTracking, SaveReport, Tracker, TrackerManager};
pub use unit_of_work::UnitOfWork;
