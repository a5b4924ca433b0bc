use regex::Regex;
use sqlx::Sqlite;

use crate::error::MigrationError;
use crate::inspector::{self, Dependency, ObjectKind};
use crate::plan::ColumnDiff;
use crate::sql::quote;

const REBUILD_SUFFIX: &str = "_migration_new";

// Matches the table name as a whole word (quoted or bare) right after
// CREATE TABLE [IF NOT EXISTS], so a column or constraint repeating the
// table's name later in the statement is left untouched.
pub fn rename_create_statement(create_sql: &str, old_name: &str, new_name: &str) -> String {
    let escaped = regex::escape(old_name);
    let pattern = format!(
        r#"(?i)(CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?)(?:"{escaped}"|`{escaped}`|\[{escaped}\]|{escaped})\b"#,
    );
    let re = Regex::new(&pattern).expect("valid generated regex");
    re.replacen(create_sql, 1, |caps: &regex::Captures| {
        format!("{}{}", &caps[1], quote(new_name))
    })
    .into_owned()
}

// Indices associated with the table are dropped implicitly when DROP TABLE
// runs below; only triggers need an explicit drop here.
async fn drop_triggers<'c>(
    tx: &mut sqlx::Transaction<'c, Sqlite>,
    table: &str,
    statements: &mut u32,
) -> Result<(), MigrationError> {
    let deps = inspector::dependencies_of(&mut **tx, table).await?;
    for dep in deps {
        if dep.kind != ObjectKind::Trigger {
            continue;
        }
        let drop_sql = format!("DROP TRIGGER {}", quote(&dep.name));
        sqlx::query(&drop_sql).execute(&mut **tx).await?;
        *statements += 1;
    }
    Ok(())
}

pub async fn rebuild_table<'c>(
    tx: &mut sqlx::Transaction<'c, Sqlite>,
    table: &str,
    target_sql: &str,
    diff: &ColumnDiff,
    dependencies: &[Dependency],
) -> Result<u32, MigrationError> {
    let mut statements = 0u32;

    drop_triggers(tx, table, &mut statements).await?;

    let temp_name = format!("{table}{REBUILD_SUFFIX}");
    let temp_sql = rename_create_statement(target_sql, table, &temp_name);
    sqlx::query(&temp_sql).execute(&mut **tx).await?;
    statements += 1;

    if !diff.common.is_empty() {
        let columns = diff
            .common
            .iter()
            .map(|c| quote(c))
            .collect::<Vec<_>>()
            .join(", ");
        let copy_sql = format!(
            "INSERT INTO {} ({columns}) SELECT {columns} FROM {}",
            quote(&temp_name),
            quote(table),
        );
        sqlx::query(&copy_sql).execute(&mut **tx).await?;
        statements += 1;
    }

    let drop_sql = format!("DROP TABLE {}", quote(table));
    sqlx::query(&drop_sql).execute(&mut **tx).await?;
    statements += 1;

    let rename_sql = format!(
        "ALTER TABLE {} RENAME TO {}",
        quote(&temp_name),
        quote(table)
    );
    sqlx::query(&rename_sql).execute(&mut **tx).await?;
    statements += 1;

    for dep in dependencies {
        sqlx::query(&dep.sql).execute(&mut **tx).await?;
        statements += 1;
    }

    Ok(statements)
}
