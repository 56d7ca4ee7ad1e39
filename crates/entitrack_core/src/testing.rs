//! In-crate fixtures for unit tests.

use crate::dao::{Capabilities, Dao, ReadDao};
use crate::entity::{EntityKey, Record};
use crate::error::{DaoError, DaoResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Note {
    pub id: String,
    pub title: String,
    pub pinned: bool,
}

impl Note {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            pinned: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NoteField {
    Title,
    Pinned,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NoteChange {
    Title(String),
    Pinned(bool),
}

impl Record for Note {
    type Field = NoteField;
    type Change = NoteChange;

    fn key(&self) -> EntityKey {
        EntityKey::new(self.id.clone())
    }

    fn field_of(change: &NoteChange) -> NoteField {
        match change {
            NoteChange::Title(_) => NoteField::Title,
            NoteChange::Pinned(_) => NoteField::Pinned,
        }
    }

    fn read(&self, field: NoteField) -> NoteChange {
        match field {
            NoteField::Title => NoteChange::Title(self.title.clone()),
            NoteField::Pinned => NoteChange::Pinned(self.pinned),
        }
    }

    fn write(&mut self, change: NoteChange) {
        match change {
            NoteChange::Title(title) => self.title = title,
            NoteChange::Pinned(pinned) => self.pinned = pinned,
        }
    }
}

/// Ordered log of DAO calls, shareable between several DAOs.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn calls(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    fn push(&self, entry: String) {
        self.entries.lock().push(entry);
    }
}

/// A DAO over an in-memory table that logs every call as `"<op> <key>"`.
#[derive(Debug, Default)]
pub(crate) struct ScriptedDao {
    name: Option<String>,
    log: CallLog,
    capabilities: Capabilities,
    failing_on: Option<String>,
    rows: Mutex<BTreeMap<String, Note>>,
}

impl ScriptedDao {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn logging_to(mut self, log: &CallLog) -> Self {
        self.log = log.clone();
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Makes the call logged as `call` fail after it is logged.
    pub fn failing_on(mut self, call: &str) -> Self {
        self.failing_on = Some(call.to_string());
        self
    }

    pub fn with_records(self, records: Vec<Note>) -> Self {
        {
            let mut rows = self.rows.lock();
            for record in records {
                rows.insert(record.id.clone(), record);
            }
        }
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.calls()
    }

    pub fn row(&self, id: &str) -> Option<Note> {
        self.rows.lock().get(id).cloned()
    }

    fn record_call(&self, call: String) -> DaoResult<()> {
        let failing = self.failing_on.as_deref() == Some(call.as_str());
        let entry = match &self.name {
            Some(name) => format!("{name}: {call}"),
            None => call,
        };
        self.log.push(entry.clone());
        if failing {
            return Err(DaoError::backend(format!("scripted failure on {entry}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ReadDao<Note> for ScriptedDao {
    async fn select_one(&self, key: &EntityKey) -> DaoResult<Option<Note>> {
        self.record_call(format!("select_one {key}"))?;
        Ok(self.row(key.as_str()))
    }

    async fn select_all(&self) -> DaoResult<Vec<Note>> {
        self.record_call("select_all".to_string())?;
        Ok(self.rows.lock().values().cloned().collect())
    }
}

#[async_trait]
impl Dao<Note> for ScriptedDao {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn create(&self, record: &Note) -> DaoResult<()> {
        self.record_call(format!("create {}", record.id))?;
        self.rows.lock().insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &Note) -> DaoResult<()> {
        self.record_call(format!("update {}", record.id))?;
        self.rows.lock().insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, record: &Note) -> DaoResult<()> {
        self.record_call(format!("delete {}", record.id))?;
        self.rows.lock().remove(&record.id);
        Ok(())
    }
}
