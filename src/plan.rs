use std::collections::HashSet;

use crate::inspector::SchemaObjects;
use crate::sql::normalize;

#[derive(Debug, Clone, Default)]
pub struct ObjectDiff {
    pub created: Vec<String>,
    pub dropped: Vec<String>,
    pub modified: Vec<String>,
}

impl ObjectDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.dropped.is_empty() && self.modified.is_empty()
    }
}

// removed = columnsOf(live) \ columnsOf(pristine)
// common = columnsOf(live) ∩ columnsOf(pristine), in live's declared
// order; governs the data-copy column list during rebuild.
#[derive(Debug, Clone)]
pub struct ColumnDiff {
    pub table: String,
    pub removed: Vec<String>,
    pub common: Vec<String>,
}

impl ColumnDiff {
    pub fn new(table: impl Into<String>, live_columns: &[String], pristine_columns: &[String]) -> Self {
        let pristine_set: HashSet<&str> = pristine_columns.iter().map(String::as_str).collect();
        let live_set: HashSet<&str> = live_columns.iter().map(String::as_str).collect();

        let removed = live_columns
            .iter()
            .filter(|c| !pristine_set.contains(c.as_str()))
            .cloned()
            .collect();

        let common = live_columns
            .iter()
            .filter(|c| live_set.contains(c.as_str()) && pristine_set.contains(c.as_str()))
            .cloned()
            .collect();

        ColumnDiff {
            table: table.into(),
            removed,
            common,
        }
    }
}

// A name present on both sides whose live-side sql is null/empty is never
// classified as modified; the recreator's own column diff handles that case.
pub fn diff_objects(live: &SchemaObjects, pristine: &SchemaObjects) -> ObjectDiff {
    let mut created = Vec::new();
    let mut dropped = Vec::new();
    let mut modified = Vec::new();

    for name in pristine.names() {
        if !live.contains(name) {
            created.push(name.to_string());
        }
    }

    for name in live.names() {
        if !pristine.contains(name) {
            dropped.push(name.to_string());
        }
    }

    for name in pristine.names() {
        let Some(live_entry) = live.entry(name) else {
            continue;
        };
        let Some(live_sql) = live_entry.sql.as_deref() else {
            continue;
        };
        if live_sql.trim().is_empty() {
            continue;
        }
        let pristine_sql = pristine.get(name).unwrap_or("");
        if normalize(live_sql) != normalize(pristine_sql) {
            modified.push(name.to_string());
        }
    }

    ObjectDiff {
        created,
        dropped,
        modified,
    }
}
