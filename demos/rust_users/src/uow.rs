//! The users/groups unit of work.

use crate::model::{Group, User};
use crate::postgres::{PostgresConnection, PostgresUserDao, StaticGroupDao};
use entitrack_core::{ChangeRepository, QueryRepository, TrackerConfig, TrackerManager, UnitOfWork};
use std::sync::Arc;

/// Read-write users over Postgres and read-only groups over a fixed list.
pub struct PostgresUnitOfWork {
    trackers: TrackerManager,
    users_dao: Arc<PostgresUserDao>,
    users: ChangeRepository<User>,
    groups: QueryRepository<Group>,
}

impl PostgresUnitOfWork {
    pub fn new(
        connection: Arc<dyn PostgresConnection>,
        groups: Vec<Group>,
        config: TrackerConfig,
    ) -> Self {
        let mut trackers = TrackerManager::with_config(config);
        let users_dao = Arc::new(PostgresUserDao::new(connection));
        let users = ChangeRepository::new(
            users_dao.clone(),
            trackers.create::<User>(users_dao.clone()),
        );
        let groups = QueryRepository::new(
            Arc::new(StaticGroupDao::new(groups)),
            trackers.create_read_only(),
        );
        Self {
            trackers,
            users_dao,
            users,
            groups,
        }
    }

    pub fn users(&self) -> &ChangeRepository<User> {
        &self.users
    }

    /// The users DAO, for its custom selectors.
    pub fn users_dao(&self) -> &PostgresUserDao {
        &self.users_dao
    }

    pub fn groups(&self) -> &QueryRepository<Group> {
        &self.groups
    }
}

impl UnitOfWork for PostgresUnitOfWork {
    fn trackers(&self) -> &TrackerManager {
        &self.trackers
    }
}
