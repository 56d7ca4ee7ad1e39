//! A Postgres-shaped connection and the DAOs built on it.
//!
//! The connection is a stand-in: it logs every statement and synthesizes a
//! row from the first parameter, which is enough to drive a unit of work
//! end to end without a database.

use crate::model::{Group, User};
use async_trait::async_trait;
use entitrack_core::{
    Capabilities, Dao, DaoError, DaoResult, EntityKey, ManySelector, ReadDao, SingleSelector,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// A statement parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Bool(bool),
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        value.map_or(Value::Null, Value::Text)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "'{v}'"),
            Value::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// A result row, by column name.
pub type Row = BTreeMap<String, Value>;

/// Connection-level failures.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// A row lacks an expected column.
    #[error("missing column {0}")]
    MissingColumn(&'static str),

    /// A column holds a value of the wrong type.
    #[error("column {column} is not {expected}")]
    TypeMismatch {
        column: &'static str,
        expected: &'static str,
    },
}

impl From<ConnectionError> for DaoError {
    fn from(err: ConnectionError) -> Self {
        DaoError::Other(Box::new(err))
    }
}

/// The three statement shapes the DAOs need.
#[async_trait]
pub trait PostgresConnection: Send + Sync {
    /// Runs a query returning any number of rows.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, ConnectionError>;

    /// Runs a query returning at most one row.
    async fn one_or_none(&self, sql: &str, params: &[Value])
        -> Result<Option<Row>, ConnectionError>;

    /// Runs a statement returning no rows.
    async fn mutation(&self, sql: &str, params: &[Value]) -> Result<(), ConnectionError>;
}

/// Logs statements and answers every query with one synthesized user row.
#[derive(Debug, Default)]
pub struct FakePostgresConnection;

impl FakePostgresConnection {
    fn log(kind: &str, sql: &str, params: &[Value]) {
        let params = params
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        info!(kind, sql, params = %params, "postgres");
    }

    fn synthesize(params: &[Value]) -> Row {
        let id = match params.first() {
            Some(Value::Int(id)) => *id,
            _ => 0,
        };
        let mut row = Row::new();
        row.insert("id".into(), Value::Int(id));
        row.insert("bitbucket_id".into(), Value::Text(id.to_string()));
        row.insert("username".into(), Value::Text(format!("user{id}")));
        row.insert("fullname".into(), Value::Text(String::new()));
        row.insert("email".into(), Value::Null);
        row.insert("group_id".into(), Value::Null);
        row.insert("student_id".into(), Value::Int(id));
        row.insert("role".into(), Value::Text("student".into()));
        row.insert("is_excluded".into(), Value::Bool(false));
        row
    }
}

#[async_trait]
impl PostgresConnection for FakePostgresConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, ConnectionError> {
        Self::log("query", sql, params);
        Ok(vec![Self::synthesize(params)])
    }

    async fn one_or_none(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<Row>, ConnectionError> {
        Self::log("one_or_none", sql, params);
        Ok(Some(Self::synthesize(params)))
    }

    async fn mutation(&self, sql: &str, params: &[Value]) -> Result<(), ConnectionError> {
        Self::log("mutation", sql, params);
        Ok(())
    }
}

fn column<'r>(row: &'r Row, column: &'static str) -> Result<&'r Value, ConnectionError> {
    row.get(column).ok_or(ConnectionError::MissingColumn(column))
}

fn int(row: &Row, name: &'static str) -> Result<i64, ConnectionError> {
    match column(row, name)? {
        Value::Int(v) => Ok(*v),
        _ => Err(ConnectionError::TypeMismatch {
            column: name,
            expected: "an integer",
        }),
    }
}

fn text(row: &Row, name: &'static str) -> Result<String, ConnectionError> {
    match column(row, name)? {
        Value::Text(v) => Ok(v.clone()),
        _ => Err(ConnectionError::TypeMismatch {
            column: name,
            expected: "text",
        }),
    }
}

fn optional_text(row: &Row, name: &'static str) -> Result<Option<String>, ConnectionError> {
    match row.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Text(v)) => Ok(Some(v.clone())),
        Some(_) => Err(ConnectionError::TypeMismatch {
            column: name,
            expected: "text or null",
        }),
    }
}

fn boolean(row: &Row, name: &'static str) -> Result<bool, ConnectionError> {
    match column(row, name)? {
        Value::Bool(v) => Ok(*v),
        _ => Err(ConnectionError::TypeMismatch {
            column: name,
            expected: "a boolean",
        }),
    }
}

impl User {
    fn from_row(row: &Row) -> Result<Self, ConnectionError> {
        Ok(Self {
            id: int(row, "id")?,
            bitbucket_id: text(row, "bitbucket_id")?,
            username: text(row, "username")?,
            fullname: text(row, "fullname")?,
            email: optional_text(row, "email")?,
            group_id: optional_text(row, "group_id")?,
            student_id: int(row, "student_id")?,
            role: text(row, "role")?,
            is_excluded: boolean(row, "is_excluded")?,
            telegram_id: optional_text(row, "telegram_id")?,
            telegram_username: optional_text(row, "telegram_username")?,
        })
    }

    fn to_params(&self) -> Vec<Value> {
        vec![
            Value::Int(self.id),
            Value::Text(self.bitbucket_id.clone()),
            Value::Text(self.username.clone()),
            Value::Text(self.fullname.clone()),
            self.email.clone().into(),
            self.group_id.clone().into(),
            Value::Int(self.student_id),
            Value::Text(self.role.clone()),
            Value::Bool(self.is_excluded),
            self.telegram_id.clone().into(),
            self.telegram_username.clone().into(),
        ]
    }
}

fn users_from_rows(rows: &[Row]) -> DaoResult<Vec<User>> {
    Ok(rows.iter().map(User::from_row).collect::<Result<_, _>>()?)
}

/// Users table access, with the custom selectors callers need.
pub struct PostgresUserDao {
    connection: Arc<dyn PostgresConnection>,
}

impl PostgresUserDao {
    pub fn new(connection: Arc<dyn PostgresConnection>) -> Self {
        Self { connection }
    }

    /// Selects the user with this login name.
    pub fn by_username<'a>(&'a self, username: &str) -> SingleSelector<'a, User> {
        let params = vec![Value::Text(username.to_string())];
        Box::pin(async move {
            let row = self
                .connection
                .one_or_none("select * from users where username = $1", &params)
                .await?;
            Ok::<_, DaoError>(row.as_ref().map(User::from_row).transpose()?)
        })
    }

    /// Selects the students of one group.
    pub fn students_of<'a>(&'a self, group_id: &str) -> ManySelector<'a, User> {
        let params = vec![Value::Text(group_id.to_string())];
        Box::pin(async move {
            let rows = self
                .connection
                .query("select * from users where group_id = $1", &params)
                .await?;
            users_from_rows(&rows)
        })
    }
}

#[async_trait]
impl ReadDao<User> for PostgresUserDao {
    async fn select_one(&self, key: &EntityKey) -> DaoResult<Option<User>> {
        let id: i64 = key
            .as_str()
            .parse()
            .map_err(|_| DaoError::backend(format!("user id {key} is not numeric")))?;
        let row = self
            .connection
            .one_or_none("select * from users where id = $1", &[Value::Int(id)])
            .await?;
        Ok(row.as_ref().map(User::from_row).transpose()?)
    }

    async fn select_all(&self) -> DaoResult<Vec<User>> {
        let rows = self.connection.query("select * from users", &[]).await?;
        users_from_rows(&rows)
    }
}

#[async_trait]
impl Dao<User> for PostgresUserDao {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    async fn create(&self, user: &User) -> DaoResult<()> {
        self.connection
            .mutation(
                "insert into users (id, bitbucket_id, username, fullname, email, group_id, \
                 student_id, role, is_excluded, telegram_id, telegram_username) \
                 values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                &user.to_params(),
            )
            .await?;
        Ok(())
    }

    async fn update(&self, user: &User) -> DaoResult<()> {
        self.connection
            .mutation(
                "update users set bitbucket_id = $2, username = $3, fullname = $4, email = $5, \
                 group_id = $6, student_id = $7, role = $8, is_excluded = $9, \
                 telegram_id = $10, telegram_username = $11 where id = $1",
                &user.to_params(),
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, user: &User) -> DaoResult<()> {
        self.connection
            .mutation("delete from users where id = $1", &[Value::Int(user.id)])
            .await?;
        Ok(())
    }
}

/// Read-only groups served from a fixed list.
pub struct StaticGroupDao {
    groups: Vec<Group>,
}

impl StaticGroupDao {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }
}

#[async_trait]
impl ReadDao<Group> for StaticGroupDao {
    async fn select_one(&self, key: &EntityKey) -> DaoResult<Option<Group>> {
        Ok(self.groups.iter().find(|g| g.id == key.as_str()).cloned())
    }

    async fn select_all(&self) -> DaoResult<Vec<Group>> {
        Ok(self.groups.clone())
    }
}
