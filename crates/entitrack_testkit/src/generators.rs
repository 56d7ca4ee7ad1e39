//! Property-based test generators using proptest.
//!
//! Value domains are kept small on purpose so generated scripts write
//! fields back to earlier values often, which is where the dirty tracking
//! rule does its interesting work.

use crate::fixtures::{UserChange, UserRecord};
use proptest::prelude::*;

/// Strategy for a single user field write.
pub fn user_change_strategy() -> impl Strategy<Value = UserChange> {
    let names = || prop::sample::select(vec!["", "X", "Y", "Hello"]);
    prop_oneof![
        1 => names().prop_map(|s| UserChange::Username(s.to_string())),
        3 => names().prop_map(|s| UserChange::Fullname(s.to_string())),
        1 => prop::option::of(Just("a@b.c".to_string())).prop_map(UserChange::Email),
        1 => prop::option::of(prop::sample::select(vec!["kp71", "kp72"]))
            .prop_map(|g| UserChange::GroupId(g.map(str::to_string))),
        1 => (0u32..3).prop_map(UserChange::StudentId),
        1 => prop::sample::select(vec!["student", "teacher"])
            .prop_map(|r| UserChange::Role(r.to_string())),
        1 => any::<bool>().prop_map(UserChange::IsExcluded),
    ]
}

/// Strategy for a sequence of field writes on one entity.
pub fn write_script_strategy(
    min_writes: usize,
    max_writes: usize,
) -> impl Strategy<Value = Vec<UserChange>> {
    prop::collection::vec(user_change_strategy(), min_writes..max_writes)
}

/// Strategy for a user record as it would be loaded from storage.
pub fn user_record_strategy() -> impl Strategy<Value = UserRecord> {
    (0u32..4, write_script_strategy(0, 6)).prop_map(|(id, writes)| {
        let mut user = UserRecord::new(id, &format!("bb{id}"));
        for change in writes {
            entitrack_core::Record::write(&mut user, change);
        }
        user
    })
}

/// One step of a script driven against a change tracker of users.
#[derive(Debug, Clone)]
pub enum TrackerStep {
    /// Write a field of the user with this id, if tracked.
    Set {
        /// User id.
        id: u32,
        /// Field write.
        change: UserChange,
    },
    /// Queue a new user with this id for insertion.
    Insert {
        /// User id.
        id: u32,
    },
    /// Queue the user with this id for deletion.
    Delete {
        /// User id.
        id: u32,
    },
    /// Cancel every pending change.
    Cancel,
}

/// Strategy for a tracker step over user ids `0..4`.
pub fn tracker_step_strategy() -> impl Strategy<Value = TrackerStep> {
    prop_oneof![
        6 => (0u32..4, user_change_strategy())
            .prop_map(|(id, change)| TrackerStep::Set { id, change }),
        1 => (0u32..4).prop_map(|id| TrackerStep::Insert { id }),
        1 => (0u32..4).prop_map(|id| TrackerStep::Delete { id }),
        1 => Just(TrackerStep::Cancel),
    ]
}

/// Strategy for a sequence of tracker steps.
pub fn tracker_script_strategy(
    min_steps: usize,
    max_steps: usize,
) -> impl Strategy<Value = Vec<TrackerStep>> {
    prop::collection::vec(tracker_step_strategy(), min_steps..max_steps)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitrack_core::Record;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn change_reads_back(change in user_change_strategy()) {
            let mut user = UserRecord::new(1, "bb1");
            user.write(change.clone());
            prop_assert_eq!(user.read(UserRecord::field_of(&change)), change);
        }

        #[test]
        fn record_keys_stay_in_range(user in user_record_strategy()) {
            prop_assert!(user.id < 4);
            prop_assert_eq!(user.key().to_string(), user.id.to_string());
        }

        #[test]
        fn scripts_respect_bounds(script in write_script_strategy(1, 8)) {
            prop_assert!(!script.is_empty());
            prop_assert!(script.len() < 8);
        }
    }
}
