use sqlx::{Executor, Row, Sqlite};

use crate::error::MigrationError;
use crate::sql::quote;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Index,
    Trigger,
    View,
}

impl ObjectKind {
    fn as_sqlite_type(self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::Index => "index",
            ObjectKind::Trigger => "trigger",
            ObjectKind::View => "view",
        }
    }
}

// sql is null for the autoindex SQLite creates behind a bare
// PRIMARY KEY/UNIQUE constraint.
#[derive(Debug, Clone)]
pub struct SchemaObject {
    pub name: String,
    pub sql: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaObjects {
    entries: Vec<SchemaObject>,
}

impl SchemaObjects {
    #[cfg(test)]
    pub(crate) fn from_entries(entries: Vec<SchemaObject>) -> Self {
        SchemaObjects { entries }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entry(name).and_then(|e| e.sql.as_deref())
    }

    pub fn entry(&self, name: &str) -> Option<&SchemaObject> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaObject> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: String,
    pub kind: ObjectKind,
    pub sql: String,
}

pub async fn list_objects<'c, E>(
    executor: E,
    kind: ObjectKind,
) -> Result<SchemaObjects, MigrationError>
where
    E: Executor<'c, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT name, sql FROM sqlite_master WHERE type = ? AND name != 'sqlite_sequence'")
        .bind(kind.as_sqlite_type())
        .fetch_all(executor)
        .await?;

    let entries = rows
        .into_iter()
        .map(|row| {
            let name: String = row.get(0);
            let sql: Option<String> = row.get(1);
            SchemaObject { name, sql }
        })
        .collect();

    Ok(SchemaObjects { entries })
}

pub async fn columns_of<'c, E>(executor: E, table: &str) -> Result<Vec<String>, MigrationError>
where
    E: Executor<'c, Database = Sqlite>,
{
    let rows = sqlx::query(&format!("PRAGMA table_info({})", quote(table)))
        .fetch_all(executor)
        .await?;

    Ok(rows.into_iter().map(|row| row.get::<String, _>(1)).collect())
}

// Auto-created indices from PRIMARY KEY/UNIQUE constraints have a null
// sql column and are filtered out here; they reappear on their own when
// the table is recreated.
pub async fn dependencies_of<'c, E>(
    executor: E,
    table: &str,
) -> Result<Vec<Dependency>, MigrationError>
where
    E: Executor<'c, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT name, type, sql FROM sqlite_master \
         WHERE tbl_name = ? AND type IN ('index', 'trigger', 'view') \
         AND sql IS NOT NULL AND sql != ''",
    )
    .bind(table)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let name: String = row.get(0);
            let kind_str: String = row.get(1);
            let sql: String = row.get(2);
            let kind = match kind_str.as_str() {
                "index" => ObjectKind::Index,
                "trigger" => ObjectKind::Trigger,
                _ => ObjectKind::View,
            };
            Dependency { name, kind, sql }
        })
        .collect())
}
