//! # EntiTrack Testkit
//!
//! Test utilities for EntiTrack.
//!
//! This crate provides:
//! - Sample records (`UserRecord`, `GroupRecord`)
//! - An in-memory DAO that records every call, with capability masks and
//!   failure injection
//! - A ready-made unit of work over users and groups
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entitrack_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn commit_issues_one_create() {
//!     let uow = MemoryUnitOfWork::new(sample_users(), sample_groups());
//!     uow.users().add(&Entity::new(UserRecord::new(9, "bb9"))).unwrap();
//!     uow.commit().await.unwrap();
//!     assert_eq!(uow.users_dao().mutations().len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use entitrack_core::{
        ChangeTracker, Entity, EntityKey, EntityState, ReadOnlyRepository, Record, Repository,
        Tracker, TrackerManager, UnitOfWork,
    };
}

pub use fixtures::*;
pub use generators::*;
