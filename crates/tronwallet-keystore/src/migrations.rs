//! Preference database schema migrations

use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension};

const SCHEMA_VERSION: i32 = 2;

/// Run all migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    tracing::debug!(
        "Running migrations: current_version={}, target_version={}",
        current_version,
        SCHEMA_VERSION
    );

    if current_version < 1 {
        apply(conn, 1, migrate_v1)?;
    }

    if current_version < 2 {
        apply(conn, 2, migrate_v2)?;
    }

    Ok(())
}

/// Apply one migration and record its version in a single transaction
fn apply(conn: &Connection, version: i32, migrate: fn(&Connection) -> Result<()>) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    migrate(&tx)?;
    set_schema_version(&tx, version)?;
    tx.commit()?;
    Ok(())
}

/// Schema version currently recorded in the database
///
/// A database without the `schema_version` table is at version 0; any other
/// read failure is returned.
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let has_table = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !has_table {
        return Ok(0);
    }

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .map_err(|e| Error::Migration(format!("Unreadable schema version: {}", e)))?;
    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        [],
    )?;

    let rows_affected = conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    if rows_affected > 0 {
        tracing::debug!("Inserted schema version {}", version);
    } else {
        tracing::debug!("Schema version {} already exists, skipped insert", version);
    }
    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS preferences (
            key TEXT PRIMARY KEY,
            value
        );
        "#,
    )
    .map_err(|e| Error::Migration(e.to_string()))?;

    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        ALTER TABLE preferences ADD COLUMN updated_at TEXT;
        "#,
    )
    .map_err(|e| Error::Migration(e.to_string()))?;

    Ok(())
}
