//! Test fixtures: sample records, an in-memory DAO and a unit of work.
//!
//! [`MemoryDao`] keeps its rows in memory and records every call it
//! receives as a [`DaoCall`], so tests can assert on exactly which
//! persistence calls a save issued and in what order.

use async_trait::async_trait;
use entitrack_core::{
    Capabilities, ChangeRepository, ChangeTracker, Dao, DaoError, DaoResult, EntityKey,
    ManySelector, Operation, QueryRepository, ReadDao, Record, SingleSelector, TrackerConfig,
    TrackerManager, UnitOfWork,
};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A user account, keyed by its numeric id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Numeric id; the entity key is its decimal form.
    pub id: u32,
    /// External account id. Never written after creation.
    pub bitbucket_id: String,
    /// Login name.
    pub username: String,
    /// Display name.
    pub fullname: String,
    /// Contact address.
    pub email: Option<String>,
    /// Group the user studies in.
    pub group_id: Option<String>,
    /// Student number.
    pub student_id: u32,
    /// Role name.
    pub role: String,
    /// Whether the user was excluded.
    pub is_excluded: bool,
}

impl UserRecord {
    /// Creates a student with empty profile fields.
    pub fn new(id: u32, bitbucket_id: &str) -> Self {
        Self {
            id,
            bitbucket_id: bitbucket_id.to_string(),
            username: String::new(),
            fullname: String::new(),
            email: None,
            group_id: None,
            student_id: 0,
            role: "student".to_string(),
            is_excluded: false,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_fullname(mut self, fullname: &str) -> Self {
        self.fullname = fullname.to_string();
        self
    }

    /// Sets the group.
    #[must_use]
    pub fn in_group(mut self, group_id: &str) -> Self {
        self.group_id = Some(group_id.to_string());
        self
    }
}

/// Writable fields of [`UserRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum UserField {
    Username,
    Fullname,
    Email,
    GroupId,
    StudentId,
    Role,
    IsExcluded,
}

/// A write to one [`UserField`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum UserChange {
    Username(String),
    Fullname(String),
    Email(Option<String>),
    GroupId(Option<String>),
    StudentId(u32),
    Role(String),
    IsExcluded(bool),
}

impl Record for UserRecord {
    type Field = UserField;
    type Change = UserChange;

    fn key(&self) -> EntityKey {
        EntityKey::new(self.id.to_string())
    }

    fn field_of(change: &UserChange) -> UserField {
        match change {
            UserChange::Username(_) => UserField::Username,
            UserChange::Fullname(_) => UserField::Fullname,
            UserChange::Email(_) => UserField::Email,
            UserChange::GroupId(_) => UserField::GroupId,
            UserChange::StudentId(_) => UserField::StudentId,
            UserChange::Role(_) => UserField::Role,
            UserChange::IsExcluded(_) => UserField::IsExcluded,
        }
    }

    fn read(&self, field: UserField) -> UserChange {
        match field {
            UserField::Username => UserChange::Username(self.username.clone()),
            UserField::Fullname => UserChange::Fullname(self.fullname.clone()),
            UserField::Email => UserChange::Email(self.email.clone()),
            UserField::GroupId => UserChange::GroupId(self.group_id.clone()),
            UserField::StudentId => UserChange::StudentId(self.student_id),
            UserField::Role => UserChange::Role(self.role.clone()),
            UserField::IsExcluded => UserChange::IsExcluded(self.is_excluded),
        }
    }

    fn write(&mut self, change: UserChange) {
        match change {
            UserChange::Username(v) => self.username = v,
            UserChange::Fullname(v) => self.fullname = v,
            UserChange::Email(v) => self.email = v,
            UserChange::GroupId(v) => self.group_id = v,
            UserChange::StudentId(v) => self.student_id = v,
            UserChange::Role(v) => self.role = v,
            UserChange::IsExcluded(v) => self.is_excluded = v,
        }
    }
}

/// A study group, keyed by its code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    /// Group code, e.g. `kp71`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Enrollment year.
    pub year: u16,
    /// Display color.
    pub color: String,
}

impl GroupRecord {
    /// Creates a group.
    pub fn new(id: &str, name: &str, year: u16) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            year,
            color: "#808080".to_string(),
        }
    }
}

/// Writable fields of [`GroupRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum GroupField {
    Name,
    Year,
    Color,
}

/// A write to one [`GroupField`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum GroupChange {
    Name(String),
    Year(u16),
    Color(String),
}

impl Record for GroupRecord {
    type Field = GroupField;
    type Change = GroupChange;

    fn key(&self) -> EntityKey {
        EntityKey::new(self.id.clone())
    }

    fn field_of(change: &GroupChange) -> GroupField {
        match change {
            GroupChange::Name(_) => GroupField::Name,
            GroupChange::Year(_) => GroupField::Year,
            GroupChange::Color(_) => GroupField::Color,
        }
    }

    fn read(&self, field: GroupField) -> GroupChange {
        match field {
            GroupField::Name => GroupChange::Name(self.name.clone()),
            GroupField::Year => GroupChange::Year(self.year),
            GroupField::Color => GroupChange::Color(self.color.clone()),
        }
    }

    fn write(&mut self, change: GroupChange) {
        match change {
            GroupChange::Name(v) => self.name = v,
            GroupChange::Year(v) => self.year = v,
            GroupChange::Color(v) => self.color = v,
        }
    }
}

/// Three users: `0` ("X", kp71), `1` ("Y", kp71) and `2` ("Z", kp72).
pub fn sample_users() -> Vec<UserRecord> {
    vec![
        UserRecord::new(0, "bb0").with_fullname("X").in_group("kp71"),
        UserRecord::new(1, "bb1").with_fullname("Y").in_group("kp71"),
        UserRecord::new(2, "bb2").with_fullname("Z").in_group("kp72"),
    ]
}

/// Two groups: `kp71` and `kp72`.
pub fn sample_groups() -> Vec<GroupRecord> {
    vec![
        GroupRecord::new("kp71", "KP-71", 2017),
        GroupRecord::new("kp72", "KP-72", 2017),
    ]
}

/// One call received by a [`MemoryDao`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaoCall {
    /// `select_one(key)`.
    SelectOne(EntityKey),
    /// `select_all()`.
    SelectAll,
    /// A custom selector, by label.
    Query(String),
    /// `create(record)`.
    Create(EntityKey),
    /// `update(record)`.
    Update(EntityKey),
    /// `delete(record)`.
    Delete(EntityKey),
}

impl DaoCall {
    fn persist(operation: Operation, key: EntityKey) -> Self {
        match operation {
            Operation::Create => Self::Create(key),
            Operation::Update => Self::Update(key),
            Operation::Delete => Self::Delete(key),
        }
    }

    /// Returns the persistence operation, if this call was one.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Create(_) => Some(Operation::Create),
            Self::Update(_) => Some(Operation::Update),
            Self::Delete(_) => Some(Operation::Delete),
            Self::SelectOne(_) | Self::SelectAll | Self::Query(_) => None,
        }
    }

    /// Returns true for create, update and delete calls.
    pub fn is_mutation(&self) -> bool {
        self.operation().is_some()
    }
}

impl fmt::Display for DaoCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectOne(key) => write!(f, "select_one {key}"),
            Self::SelectAll => write!(f, "select_all"),
            Self::Query(label) => write!(f, "query {label}"),
            Self::Create(key) => write!(f, "create {key}"),
            Self::Update(key) => write!(f, "update {key}"),
            Self::Delete(key) => write!(f, "delete {key}"),
        }
    }
}

/// An in-memory DAO that records every call.
///
/// Rows keep insertion order. Creating an existing key or updating a
/// missing one fails; deleting a missing key succeeds. Persistence calls can
/// be made to fail per key with [`MemoryDao::fail_on`]; a failing call is
/// still recorded.
pub struct MemoryDao<R: Record> {
    rows: RwLock<Vec<R>>,
    calls: Mutex<Vec<DaoCall>>,
    capabilities: Capabilities,
    failures: Mutex<Vec<(Operation, EntityKey)>>,
}

impl<R: Record> MemoryDao<R> {
    /// Creates an empty DAO supporting every operation.
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    /// Creates a DAO holding `rows`.
    pub fn with_rows(rows: Vec<R>) -> Self {
        Self {
            rows: RwLock::new(rows),
            calls: Mutex::new(Vec::new()),
            capabilities: Capabilities::ALL,
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Restricts the supported operations.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Makes the DAO read-only.
    #[must_use]
    pub fn read_only(self) -> Self {
        self.with_capabilities(Capabilities::READ_ONLY)
    }

    /// Makes every later `operation` call for `key` fail.
    pub fn fail_on(&self, operation: Operation, key: impl Into<EntityKey>) {
        self.failures.lock().push((operation, key.into()));
    }

    /// Removes every injected failure.
    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// Returns every call received so far, oldest first.
    pub fn calls(&self) -> Vec<DaoCall> {
        self.calls.lock().clone()
    }

    /// Returns the persistence calls received so far, oldest first.
    pub fn mutations(&self) -> Vec<DaoCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    /// Returns the calls received so far in `"<call> <key>"` form.
    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().iter().map(ToString::to_string).collect()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Returns the stored rows.
    pub fn rows(&self) -> Vec<R> {
        self.rows.read().clone()
    }

    /// Returns the stored row with this key.
    pub fn row(&self, key: &EntityKey) -> Option<R> {
        self.rows.read().iter().find(|r| &r.key() == key).cloned()
    }

    /// Returns a selector yielding every row matching `predicate`.
    ///
    /// The call is recorded as [`DaoCall::Query`] with `label`.
    pub fn select_where<'a, F>(&'a self, label: &str, predicate: F) -> ManySelector<'a, R>
    where
        F: Fn(&R) -> bool + Send + 'a,
    {
        let label = label.to_string();
        Box::pin(async move {
            self.record(DaoCall::Query(label));
            Ok(self
                .rows
                .read()
                .iter()
                .filter(|r| predicate(*r))
                .cloned()
                .collect())
        })
    }

    /// Returns a selector yielding the first row matching `predicate`.
    pub fn find_where<'a, F>(&'a self, label: &str, predicate: F) -> SingleSelector<'a, R>
    where
        F: Fn(&R) -> bool + Send + 'a,
    {
        let label = label.to_string();
        Box::pin(async move {
            self.record(DaoCall::Query(label));
            Ok(self.rows.read().iter().find(|r| predicate(*r)).cloned())
        })
    }

    fn record(&self, call: DaoCall) {
        trace!(call = %call, "memory dao call");
        self.calls.lock().push(call);
    }

    fn mutate(&self, operation: Operation, record: &R) -> DaoResult<()> {
        let key = record.key();
        let call = DaoCall::persist(operation, key.clone());
        self.record(call.clone());

        if self
            .failures
            .lock()
            .iter()
            .any(|(op, k)| *op == operation && *k == key)
        {
            return Err(DaoError::backend(format!("injected failure on {call}")));
        }

        let mut rows = self.rows.write();
        let position = rows.iter().position(|r| r.key() == key);
        match (operation, position) {
            (Operation::Create, None) => rows.push(record.clone()),
            (Operation::Create, Some(_)) => {
                return Err(DaoError::backend(format!("duplicate key {key}")));
            }
            (Operation::Update, Some(index)) => rows[index] = record.clone(),
            (Operation::Update, None) => {
                return Err(DaoError::backend(format!("no row with key {key}")));
            }
            (Operation::Delete, Some(index)) => {
                rows.remove(index);
            }
            (Operation::Delete, None) => {}
        }
        Ok(())
    }
}

impl<R: Record> Default for MemoryDao<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> fmt::Debug for MemoryDao<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDao")
            .field("rows", &self.rows.read().len())
            .field("calls", &self.calls.lock().len())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

#[async_trait]
impl<R: Record> ReadDao<R> for MemoryDao<R> {
    async fn select_one(&self, key: &EntityKey) -> DaoResult<Option<R>> {
        self.record(DaoCall::SelectOne(key.clone()));
        Ok(self.row(key))
    }

    async fn select_all(&self) -> DaoResult<Vec<R>> {
        self.record(DaoCall::SelectAll);
        Ok(self.rows())
    }
}

#[async_trait]
impl<R: Record> Dao<R> for MemoryDao<R> {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn create(&self, record: &R) -> DaoResult<()> {
        self.mutate(Operation::Create, record)
    }

    async fn update(&self, record: &R) -> DaoResult<()> {
        self.mutate(Operation::Update, record)
    }

    async fn delete(&self, record: &R) -> DaoResult<()> {
        self.mutate(Operation::Delete, record)
    }
}

/// A unit of work over read-write users and read-only groups, both backed
/// by [`MemoryDao`]s.
pub struct MemoryUnitOfWork {
    trackers: TrackerManager,
    users_dao: Arc<MemoryDao<UserRecord>>,
    users: ChangeRepository<UserRecord>,
    groups_dao: Arc<MemoryDao<GroupRecord>>,
    groups: QueryRepository<GroupRecord>,
}

impl MemoryUnitOfWork {
    /// Creates a unit of work over fresh DAOs holding `users` and `groups`.
    pub fn new(users: Vec<UserRecord>, groups: Vec<GroupRecord>) -> Self {
        Self::with_config(users, groups, TrackerConfig::default())
    }

    /// Like [`MemoryUnitOfWork::new`], with a tracker configuration.
    pub fn with_config(
        users: Vec<UserRecord>,
        groups: Vec<GroupRecord>,
        config: TrackerConfig,
    ) -> Self {
        Self::from_parts(
            TrackerManager::with_config(config),
            Arc::new(MemoryDao::with_rows(users)),
            Arc::new(MemoryDao::with_rows(groups).read_only()),
        )
    }

    /// Creates a unit of work from a tracker manager and existing DAOs.
    pub fn from_parts(
        mut trackers: TrackerManager,
        users_dao: Arc<MemoryDao<UserRecord>>,
        groups_dao: Arc<MemoryDao<GroupRecord>>,
    ) -> Self {
        let changes = trackers.create::<UserRecord>(users_dao.clone());
        let users = ChangeRepository::new(users_dao.clone(), changes);
        let groups = QueryRepository::new(groups_dao.clone(), trackers.create_read_only());
        Self {
            trackers,
            users_dao,
            users,
            groups_dao,
            groups,
        }
    }

    /// Returns the users repository.
    pub fn users(&self) -> &ChangeRepository<UserRecord> {
        &self.users
    }

    /// Returns the users change tracker.
    pub fn user_changes(&self) -> &ChangeTracker<UserRecord> {
        self.users.changes()
    }

    /// Returns the users DAO.
    pub fn users_dao(&self) -> &MemoryDao<UserRecord> {
        &self.users_dao
    }

    /// Returns the groups repository.
    pub fn groups(&self) -> &QueryRepository<GroupRecord> {
        &self.groups
    }

    /// Returns the groups DAO.
    pub fn groups_dao(&self) -> &MemoryDao<GroupRecord> {
        &self.groups_dao
    }
}

impl UnitOfWork for MemoryUnitOfWork {
    fn trackers(&self) -> &TrackerManager {
        &self.trackers
    }
}

impl fmt::Debug for MemoryUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryUnitOfWork")
            .field("trackers", &self.trackers)
            .field("users", &self.users)
            .field("groups", &self.groups)
            .finish()
    }
}
