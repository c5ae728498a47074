//! SQLite schema migrations for the sync store.
//!
//! Two tables, both keyed by the identity triple:
//! - `snapshots` holds the last reconciled record per identity, serialized
//!   whole so comparisons never need a re-fetch
//! - `commands` holds pending directional patches; the primary key makes
//!   a second enqueue for the same identity an upsert (coalescing)

use rusqlite::{Connection, types::Type};

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 1;

/// Migration v1: snapshot and command tables.
const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS snapshots (
    org TEXT NOT NULL CHECK (length(trim(org)) > 0),
    repo TEXT NOT NULL CHECK (length(trim(repo)) > 0),
    number INTEGER NOT NULL CHECK (number >= 0),
    record TEXT NOT NULL,
    updated_at_us INTEGER NOT NULL,
    PRIMARY KEY (org, repo, number)
);

CREATE TABLE IF NOT EXISTS commands (
    org TEXT NOT NULL CHECK (length(trim(org)) > 0),
    repo TEXT NOT NULL CHECK (length(trim(repo)) > 0),
    number INTEGER NOT NULL CHECK (number >= 0),
    target TEXT NOT NULL CHECK (target IN ('tracker', 'mirror')),
    payload TEXT NOT NULL,
    reason TEXT NOT NULL DEFAULT '',
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (org, repo, number)
);
";

const MIGRATIONS: &[(u32, &str)] = &[(1, MIGRATION_V1_SQL)];

/// Read `PRAGMA user_version` and convert it to a Rust `u32`.
///
/// # Errors
///
/// Returns an error if querying SQLite fails or the version value cannot be
/// represented as `u32`.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply all pending migrations in ascending order.
///
/// Idempotent: each migration only runs when its version is above
/// `user_version`, and the DDL itself uses `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if any migration fails.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.commit()?;
        current = *version;
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::{LATEST_SCHEMA_VERSION, current_schema_version, migrate};
    use rusqlite::{Connection, params};

    fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![name],
            |row| row.get(0),
        )
    }

    #[test]
    fn migrate_empty_db_to_latest() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;

        let applied = migrate(&mut conn)?;
        assert_eq!(applied, LATEST_SCHEMA_VERSION);
        assert_eq!(current_schema_version(&conn)?, LATEST_SCHEMA_VERSION);

        assert!(table_exists(&conn, "snapshots")?);
        assert!(table_exists(&conn, "commands")?);
        Ok(())
    }

    #[test]
    fn migrate_is_idempotent() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        let applied = migrate(&mut conn)?;
        assert_eq!(applied, LATEST_SCHEMA_VERSION);
        Ok(())
    }

    #[test]
    fn command_target_is_constrained() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;

        let result = conn.execute(
            "INSERT INTO commands (org, repo, number, target, payload, created_at_us)
             VALUES ('acme', 'widgets', 1, 'elsewhere', '{}', 0)",
            [],
        );
        assert!(result.is_err(), "unknown target must be rejected");
        Ok(())
    }
}
