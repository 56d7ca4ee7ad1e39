//! User and group records.
//!
//! Records mirror the full table shape, so not every field change is used.

use entitrack_core::{EntityKey, Record};

/// A user account.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub bitbucket_id: String,
    pub username: String,
    pub fullname: String,
    pub email: Option<String>,
    pub group_id: Option<String>,
    pub student_id: i64,
    pub role: String,
    pub is_excluded: bool,
    pub telegram_id: Option<String>,
    pub telegram_username: Option<String>,
}

impl User {
    pub fn new(id: i64, bitbucket_id: impl Into<String>) -> Self {
        Self {
            id,
            bitbucket_id: bitbucket_id.into(),
            username: String::new(),
            fullname: String::new(),
            email: None,
            group_id: None,
            student_id: 0,
            role: "student".to_string(),
            is_excluded: false,
            telegram_id: None,
            telegram_username: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserField {
    Username,
    Fullname,
    Email,
    GroupId,
    StudentId,
    Role,
    IsExcluded,
    TelegramId,
    TelegramUsername,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserChange {
    Username(String),
    Fullname(String),
    Email(Option<String>),
    GroupId(Option<String>),
    StudentId(i64),
    Role(String),
    IsExcluded(bool),
    TelegramId(Option<String>),
    TelegramUsername(Option<String>),
}

impl Record for User {
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
            UserChange::TelegramId(_) => UserField::TelegramId,
            UserChange::TelegramUsername(_) => UserField::TelegramUsername,
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
            UserField::TelegramId => UserChange::TelegramId(self.telegram_id.clone()),
            UserField::TelegramUsername => {
                UserChange::TelegramUsername(self.telegram_username.clone())
            }
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
            UserChange::TelegramId(v) => self.telegram_id = v,
            UserChange::TelegramUsername(v) => self.telegram_username = v,
        }
    }
}

/// A study group.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub year: i32,
    pub color: String,
}

impl Group {
    pub fn new(id: &str, name: &str, year: i32, color: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            year,
            color: color.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupField {
    Name,
    Year,
    Color,
}

// Groups are never edited by the demo; the variants exist for the record contract.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub enum GroupChange {
    Name(String),
    Year(i32),
    Color(String),
}

impl Record for Group {
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
