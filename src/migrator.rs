use sqlx::{Executor, Row, Sqlite, SqlitePool};
use tracing::{info, instrument};

use crate::error::MigrationError;
use crate::inspector::{self, Dependency, ObjectKind, SchemaObjects};
use crate::plan::{self, ColumnDiff, ObjectDiff};
use crate::recreate;
use crate::sql::{ensure_pragma_allowed, normalize, quote};
use crate::validator;

#[instrument(skip(pool, schema))]
pub async fn migrate(
    pool: &SqlitePool,
    schema: &str,
    allow_deletions: bool,
) -> Result<bool, MigrationError> {
    validator::validate_schema(schema)?;

    // Create pristine database with the target schema.
    let pristine_pool = SqlitePool::connect("sqlite::memory:").await?;
    if !schema.trim().is_empty() {
        sqlx::raw_sql(schema)
            .execute(&pristine_pool)
            .await
            .map_err(|e| MigrationError::InvalidSchema(e.to_string()))?;
    }

    let mut tx = pool.begin().await?;

    let orig_foreign_keys = read_bool_pragma(&mut *tx, "foreign_keys").await?;
    if orig_foreign_keys {
        sqlx::query("PRAGMA foreign_keys = OFF").execute(&mut *tx).await?;
    }
    sqlx::query("PRAGMA defer_foreign_keys = TRUE")
        .execute(&mut *tx)
        .await?;

    let mut change_counter = 0u32;

    let outcome = apply_changes(
        &mut tx,
        &pristine_pool,
        allow_deletions,
        orig_foreign_keys,
        &mut change_counter,
    )
    .await;

    match outcome {
        Ok(()) => {
            tx.commit().await?;
        }
        Err(e) => {
            tx.rollback().await?;
            if orig_foreign_keys {
                sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
            }
            return Err(e);
        }
    }

    reconcile_foreign_keys_pragma(pool, &pristine_pool, orig_foreign_keys, &mut change_counter).await?;

    if change_counter > 0 {
        info!(change_counter, "applying VACUUM after schema migration");
        sqlx::query("VACUUM").execute(pool).await?;
    }

    Ok(change_counter > 0)
}

#[instrument(skip(tx, pristine_pool, change_counter))]
async fn apply_changes<'c>(
    tx: &mut sqlx::Transaction<'c, Sqlite>,
    pristine_pool: &SqlitePool,
    allow_deletions: bool,
    orig_foreign_keys: bool,
    change_counter: &mut u32,
) -> Result<(), MigrationError> {
    // Step 1: views may reference tables about to be rebuilt, so every
    // live view is dropped up front and reinstalled in step 7. The drop
    // itself is never counted; only a net change versus the prior
    // definition is.
    let live_views_before = inspector::list_objects(&mut **tx, ObjectKind::View).await?;
    for name in live_views_before.names() {
        sqlx::query(&format!("DROP VIEW {}", quote(name)))
            .execute(&mut **tx)
            .await?;
    }

    let live_tables = inspector::list_objects(&mut **tx, ObjectKind::Table).await?;
    let pristine_tables = inspector::list_objects(pristine_pool, ObjectKind::Table).await?;
    let table_diff = plan::diff_objects(&live_tables, &pristine_tables);

    let mut column_diffs = Vec::with_capacity(table_diff.modified.len());
    for name in &table_diff.modified {
        let live_cols = inspector::columns_of(&mut **tx, name).await?;
        let pristine_cols = inspector::columns_of(pristine_pool, name).await?;
        column_diffs.push(ColumnDiff::new(name.clone(), &live_cols, &pristine_cols));
    }

    enforce_deletion_guard(&table_diff, &column_diffs, allow_deletions)?;

    // Step 2: create new tables.
    for name in &table_diff.created {
        if let Some(sql) = pristine_tables.get(name) {
            sqlx::query(sql).execute(&mut **tx).await?;
            *change_counter += 1;
        }
    }

    // Step 3: drop removed tables (guard already passed above).
    for name in &table_diff.dropped {
        sqlx::query(&format!("DROP TABLE {}", quote(name)))
            .execute(&mut **tx)
            .await?;
        *change_counter += 1;
    }

    // Step 4: rebuild modified tables.
    for diff in &column_diffs {
        let target_sql = pristine_tables.get(&diff.table).ok_or_else(|| {
            MigrationError::InvalidSchema(format!(
                "pristine database has no definition for table {}",
                diff.table
            ))
        })?;

        let pristine_deps: Vec<Dependency> = inspector::dependencies_of(pristine_pool, &diff.table)
            .await?
            .into_iter()
            .filter(|d| d.kind == ObjectKind::Index || d.kind == ObjectKind::Trigger)
            .collect();

        let statements =
            recreate::rebuild_table(tx, &diff.table, target_sql, diff, &pristine_deps).await?;
        *change_counter += statements;
    }

    // Step 5 / 6: reconcile standalone indices and triggers.
    reconcile_simple(tx, pristine_pool, ObjectKind::Index, change_counter).await?;
    reconcile_simple(tx, pristine_pool, ObjectKind::Trigger, change_counter).await?;

    // Step 7: reconcile views.
    reconcile_views(tx, pristine_pool, &live_views_before, change_counter).await?;

    // Step 8: migrate user_version.
    let live_version = read_i64_pragma(&mut **tx, "user_version").await?;
    let pristine_version = read_i64_pragma(pristine_pool, "user_version").await?;
    if live_version != pristine_version {
        sqlx::query(&format!("PRAGMA user_version = {pristine_version}"))
            .execute(&mut **tx)
            .await?;
        *change_counter += 1;
    }

    // Step 9: foreign-key check. Either side having foreign_keys ON is
    // sufficient to require it, not just the pristine side.
    let pristine_foreign_keys = read_bool_pragma(pristine_pool, "foreign_keys").await?;
    if orig_foreign_keys || pristine_foreign_keys {
        let rows = sqlx::query("PRAGMA foreign_key_check")
            .fetch_all(&mut **tx)
            .await?;
        if !rows.is_empty() {
            return Err(MigrationError::ForeignKeyViolation(format!(
                "{} violation(s)",
                rows.len()
            )));
        }
    }

    Ok(())
}

fn enforce_deletion_guard(
    table_diff: &ObjectDiff,
    column_diffs: &[ColumnDiff],
    allow_deletions: bool,
) -> Result<(), MigrationError> {
    if allow_deletions {
        return Ok(());
    }

    for diff in column_diffs {
        if !diff.removed.is_empty() {
            return Err(MigrationError::ColumnDeletionRefused {
                table: diff.table.clone(),
                columns: diff.removed.clone(),
            });
        }
    }

    if !table_diff.dropped.is_empty() {
        return Err(MigrationError::DeletionRefused(table_diff.dropped.clone()));
    }

    Ok(())
}

// Drop what's gone, create what's new, drop-then-create what changed.
async fn reconcile_simple<'c>(
    tx: &mut sqlx::Transaction<'c, Sqlite>,
    pristine_pool: &SqlitePool,
    kind: ObjectKind,
    change_counter: &mut u32,
) -> Result<(), MigrationError> {
    let keyword = match kind {
        ObjectKind::Index => "INDEX",
        ObjectKind::Trigger => "TRIGGER",
        ObjectKind::Table | ObjectKind::View => unreachable!("only called for index/trigger"),
    };

    let live = inspector::list_objects(&mut **tx, kind).await?;
    let pristine = inspector::list_objects(pristine_pool, kind).await?;
    let diff = plan::diff_objects(&live, &pristine);

    for name in &diff.dropped {
        if live.get(name).is_none() {
            continue;
        }
        sqlx::query(&format!("DROP {keyword} {}", quote(name)))
            .execute(&mut **tx)
            .await?;
        *change_counter += 1;
    }

    for name in &diff.modified {
        sqlx::query(&format!("DROP {keyword} {}", quote(name)))
            .execute(&mut **tx)
            .await?;
        *change_counter += 1;
        if let Some(sql) = pristine.get(name) {
            sqlx::query(sql).execute(&mut **tx).await?;
            *change_counter += 1;
        }
    }

    for name in &diff.created {
        if let Some(sql) = pristine.get(name) {
            sqlx::query(sql).execute(&mut **tx).await?;
            *change_counter += 1;
        }
    }

    Ok(())
}

// Reinstall every pristine view (all live views were dropped up front in
// step 1). Counts as a change only if its definition differs from what
// it was before the drop.
async fn reconcile_views<'c>(
    tx: &mut sqlx::Transaction<'c, Sqlite>,
    pristine_pool: &SqlitePool,
    live_views_before: &SchemaObjects,
    change_counter: &mut u32,
) -> Result<(), MigrationError> {
    let pristine_views = inspector::list_objects(pristine_pool, ObjectKind::View).await?;

    for name in pristine_views.names() {
        let Some(sql) = pristine_views.get(name) else {
            continue;
        };
        sqlx::query(sql).execute(&mut **tx).await?;

        let unchanged = live_views_before
            .get(name)
            .is_some_and(|prior| normalize(prior) == normalize(sql));
        if !unchanged {
            *change_counter += 1;
        }
    }

    for name in live_views_before.names() {
        if !pristine_views.contains(name) {
            *change_counter += 1;
        }
    }

    Ok(())
}

// If the post-migration pristine value equals the value the live DB had
// before the migration started, rewind the counter increment so idempotent
// re-runs don't trigger a spurious VACUUM.
async fn reconcile_foreign_keys_pragma(
    pool: &SqlitePool,
    pristine_pool: &SqlitePool,
    orig_foreign_keys: bool,
    change_counter: &mut u32,
) -> Result<(), MigrationError> {
    let live_fk = read_bool_pragma(pool, "foreign_keys").await?;
    let pristine_fk = read_bool_pragma(pristine_pool, "foreign_keys").await?;

    if pristine_fk != live_fk {
        let pre_reconcile = *change_counter;
        sqlx::query(&format!(
            "PRAGMA foreign_keys = {}",
            if pristine_fk { "ON" } else { "OFF" }
        ))
        .execute(pool)
        .await?;
        *change_counter += 1;

        if pristine_fk == orig_foreign_keys {
            *change_counter = pre_reconcile;
        }
    }

    Ok(())
}

async fn read_bool_pragma<'c, E>(executor: E, name: &str) -> Result<bool, MigrationError>
where
    E: Executor<'c, Database = Sqlite>,
{
    ensure_pragma_allowed(name)?;
    let value: i64 = sqlx::query(&format!("PRAGMA {name}"))
        .fetch_one(executor)
        .await?
        .get(0);
    Ok(value != 0)
}

async fn read_i64_pragma<'c, E>(executor: E, name: &str) -> Result<i64, MigrationError>
where
    E: Executor<'c, Database = Sqlite>,
{
    ensure_pragma_allowed(name)?;
    let value: i64 = sqlx::query(&format!("PRAGMA {name}"))
        .fetch_one(executor)
        .await?
        .get(0);
    Ok(value)
}
