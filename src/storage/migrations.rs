//! Versioned schema migrations for the SQLite store.
//!
//! The current version lives in the single-row `schema_version` table. Each
//! [`Migration`] carries the SQL to move one version up and the SQL to undo it.
//! [`apply_migrations`] runs every pending `up` step in order inside one
//! transaction, so a failing step leaves the schema untouched. [`migrate_to`]
//! moves to an explicit version in either direction, e.g. before running an
//! older build against the same file.
//!
//! To change the schema, append a migration with the next version number:
//!
//! ```rust,ignore
//! Migration {
//!     version: 3,
//!     up: "ALTER TABLE questions ADD COLUMN rating INTEGER;",
//!     down: "ALTER TABLE questions DROP COLUMN rating;",
//! },
//! ```
//!
//! Never edit a migration that has already shipped.

use super::StorageError;
use rusqlite::{Connection, OptionalExtension, Transaction};
use tracing::info;

/// Represents a database migration with up and down SQL statements
#[derive(Debug)]
pub struct Migration {
    /// The version number of this migration
    pub version: i32,
    /// SQL statements to apply this migration
    pub up: &'static str,
    /// SQL statements to reverse this migration
    pub down: &'static str,
}

/// List of all database migrations in order of application
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        up: r#"
            CREATE TABLE categories (
                id INTEGER PRIMARY KEY,
                type TEXT NOT NULL
            );
            CREATE TABLE questions (
                id INTEGER PRIMARY KEY,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                category INTEGER NOT NULL REFERENCES categories(id),
                difficulty INTEGER NOT NULL CHECK (difficulty BETWEEN 1 AND 5),
                created_at TEXT NOT NULL
            );
        "#,
        down: r#"
            DROP TABLE questions;
            DROP TABLE categories;
        "#,
    },
    Migration {
        version: 2,
        up: "CREATE INDEX idx_questions_category ON questions(category);",
        down: "DROP INDEX idx_questions_category;",
    },
];

/// Latest schema version known to this build.
pub fn latest_version() -> i32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Creates the `schema_version` table at version 0 if it does not exist yet.
pub fn ensure_version_table(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| StorageError::Migration(format!("Failed to create schema_version: {}", e)))?;

    let existing: Option<i32> = conn
        .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
        .optional()?;
    if existing.is_none() {
        conn.execute("INSERT INTO schema_version (version) VALUES (0)", [])?;
    }
    Ok(())
}

/// Get the current schema version from the database
pub fn get_current_version(conn: &Connection) -> Result<i32, StorageError> {
    let version: i32 = conn
        .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
        .map_err(|e| StorageError::Migration(format!("Failed to get schema version: {}", e)))?;
    Ok(version)
}

/// Apply any pending migrations to the database and return the resulting version.
///
/// A database written by a newer build is left as it is.
pub fn apply_migrations(conn: &mut Connection) -> Result<i32, StorageError> {
    ensure_version_table(conn)?;
    let current_version = get_current_version(conn)?;
    if current_version >= latest_version() {
        return Ok(current_version);
    }
    migrate_to(conn, latest_version())
}

/// Move the schema to `target`, running `up` steps forward or `down` steps
/// newest first. Every step shares one transaction.
pub fn migrate_to(conn: &mut Connection, target: i32) -> Result<i32, StorageError> {
    let latest = latest_version();
    if !(0..=latest).contains(&target) {
        return Err(StorageError::Migration(format!(
            "Unknown schema version {} (this build knows 0 to {})",
            target, latest
        )));
    }

    ensure_version_table(conn)?;
    let current = get_current_version(conn)?;
    if current == target {
        return Ok(current);
    }

    let tx = conn.transaction()?;
    if target > current {
        for migration in MIGRATIONS
            .iter()
            .filter(|m| m.version > current && m.version <= target)
        {
            run_step(&tx, migration, migration.up, migration.version)?;
        }
    } else {
        for migration in MIGRATIONS
            .iter()
            .rev()
            .filter(|m| m.version <= current && m.version > target)
        {
            run_step(&tx, migration, migration.down, migration.version - 1)?;
        }
    }
    tx.commit()?;

    info!(from = current, to = target, "Migrated schema");
    Ok(target)
}

/// Runs one direction of `migration` and records `resulting` as the version.
fn run_step(
    tx: &Transaction,
    migration: &Migration,
    sql: &str,
    resulting: i32,
) -> Result<(), StorageError> {
    tx.execute_batch(sql)
        .and_then(|()| tx.execute("UPDATE schema_version SET version = ?1", [resulting]))
        .map(|_| ())
        .map_err(|e| StorageError::Migration(format!("Migration {} failed: {}", migration.version, e)))
}
