#![allow(dead_code)]

use rowmap_core::{open_db_in_memory, ChangeSet, ChangeTracker, Entity};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql};

pub const SCHEMA_SQL: &str = "
CREATE TABLE person (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    email TEXT,
    age INTEGER,
    current_mood TEXT
);
CREATE TABLE employee (
    id INTEGER PRIMARY KEY REFERENCES person(id),
    company TEXT
);
CREATE TABLE manager (
    id INTEGER PRIMARY KEY REFERENCES employee(id),
    title TEXT
);
CREATE TABLE executive (
    id INTEGER PRIMARY KEY REFERENCES manager(id),
    level INTEGER
);
CREATE TABLE city (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL DEFAULT '',
    zip_code TEXT NOT NULL DEFAULT ''
);
";

pub fn open_test_db() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(SCHEMA_SQL).unwrap();
    conn
}

/// Mood stored as text; `Unknown` is written as SQL NULL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mood {
    #[default]
    Unknown,
    Happy,
    Grumpy,
}

impl ToSql for Mood {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(match self {
            Self::Unknown => "<nil>",
            Self::Happy => "happy",
            Self::Grumpy => "grumpy",
        }))
    }
}

impl FromSql for Mood {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Self::Unknown),
            other => match other.as_str()? {
                "happy" => Ok(Self::Happy),
                "grumpy" => Ok(Self::Grumpy),
                _ => Err(FromSqlError::InvalidType),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct Person {
    #[db = "id"]
    pub id: i64,
    #[db = "first_name"]
    pub first_name: String,
    #[db = "last_name"]
    pub last_name: String,
    #[db = "email"]
    pub email: Option<String>,
    #[db = "age"]
    pub age: Option<i64>,
    #[db = "current_mood"]
    pub current_mood: Mood,
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct Employee {
    #[extends]
    #[db = ",table=person"]
    pub person: Person,
    #[db = "company"]
    pub company: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct Manager {
    #[extends]
    #[db = ",table=employee"]
    pub employee: Employee,
    #[db = "title"]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct Executive {
    #[extends]
    #[db = ",table=manager"]
    pub manager: Manager,
    #[db = "level"]
    pub level: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct City {
    #[db = "id"]
    pub id: i64,
    #[db = "name"]
    pub name: String,
    #[db = "zip_code"]
    pub zip_code: String,
}

/// Change-tracking wrapper shaped like the code the enhancer emits.
#[derive(Debug, Clone, Default, Entity)]
#[rowmap(change_tracker)]
pub struct ManagerWithUpdateTracker {
    #[extends]
    pub entity: Manager,
    pub track_map: ChangeSet,
}

impl ManagerWithUpdateTracker {
    pub fn new(entity: Manager) -> Self {
        Self {
            entity,
            track_map: ChangeSet::new(),
        }
    }

    pub fn set_email(&mut self, email: Option<String>) {
        self.entity.employee.person.email = email;
        self.track_map.register_change("person", "email");
    }

    pub fn set_company(&mut self, company: Option<String>) {
        self.entity.employee.company = company;
        self.track_map.register_change("employee", "company");
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.entity.title = title;
        self.track_map.register_change("manager", "title");
    }
}

impl ChangeTracker for ManagerWithUpdateTracker {
    fn columns_changed(&self, table: Option<&str>) -> Vec<String> {
        self.track_map.columns_changed(table.unwrap_or("manager"))
    }
}

pub fn person(first_name: &str, last_name: &str) -> Person {
    Person {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        ..Person::default()
    }
}

pub fn manager(first_name: &str, last_name: &str) -> Manager {
    Manager {
        employee: Employee {
            person: person(first_name, last_name),
            company: Some("Acme".to_string()),
        },
        title: Some("Director".to_string()),
    }
}

pub fn count_rows(conn: &Connection, table: &str, id: i64) -> i64 {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE id = ?1"),
        [id],
        |row| row.get(0),
    )
    .unwrap()
}
