//! Schema upgrades for the notebook database.
//!
//! Each upgrade is a SQL script compiled into the binary and identified by
//! a version number. `schema_version` records which ones have run.

use rusqlite::Connection;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("migrations/001_baseline.sql"),
}];

fn ensure_schema_version_table(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("Cannot create schema_version: {}", e))
}

/// Highest recorded version; 0 on a fresh database.
fn current_version(conn: &Connection) -> Result<i32, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| format!("Cannot read schema version: {}", e))
}

/// Copy a file-backed database to `<path>.v<version>.bak` before upgrading
/// it. In-memory databases have no path and are left alone.
fn snapshot_before_upgrade(conn: &Connection, version: i32) -> Result<(), String> {
    let path: String = conn
        .query_row("PRAGMA database_list", [], |row| row.get(2))
        .map_err(|e| format!("Cannot resolve database file: {}", e))?;
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }

    let snapshot = format!("{}.v{}.bak", path, version);
    let mut target = Connection::open(&snapshot)
        .map_err(|e| format!("Cannot open snapshot {}: {}", snapshot, e))?;
    rusqlite::backup::Backup::new(conn, &mut target)
        .and_then(|backup| backup.step(-1).map(|_| ()))
        .map_err(|e| format!("Snapshot to {} failed: {}", snapshot, e))?;

    log::info!("Saved schema v{} snapshot to {}", version, snapshot);
    Ok(())
}

/// Apply one script and record its version in the same transaction.
fn apply(conn: &Connection, migration: &Migration) -> Result<(), String> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| format!("Cannot start migration v{}: {}", migration.version, e))?;
    tx.execute_batch(migration.sql)
        .map_err(|e| format!("Migration v{} failed: {}", migration.version, e))?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [migration.version],
    )
    .map_err(|e| format!("Cannot record migration v{}: {}", migration.version, e))?;
    tx.commit()
        .map_err(|e| format!("Cannot commit migration v{}: {}", migration.version, e))
}

/// Bring the schema up to date and return how many scripts ran.
///
/// Refuses databases written by a newer build.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    ensure_schema_version_table(conn)?;

    let current = current_version(conn)?;
    let latest = MIGRATIONS.last().map_or(0, |m| m.version);
    if current > latest {
        return Err(format!(
            "Database is at schema v{} but this benchbook only knows up to v{}",
            current, latest
        ));
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        return Ok(0);
    }
    if current > 0 {
        snapshot_before_upgrade(conn, current)?;
    }

    for migration in &pending {
        apply(conn, migration)?;
        log::info!("Schema upgraded to v{}", migration.version);
    }
    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_db() -> Connection {
        Connection::open_in_memory().expect("in-memory db")
    }

    #[test]
    fn test_fresh_db_applies_baseline() {
        let conn = mem_db();
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, 1);
        assert_eq!(current_version(&conn).expect("version query"), 1);

        for table in [
            "teams",
            "users",
            "experiments",
            "items",
            "experiments_templates",
            "items_types",
            "experiments_status",
            "items_status",
            "experiments_categories",
            "tags2entity",
            "entity_links",
            "steps",
            "uploads",
            "pin2users",
            "exclusive_edit_mode",
        ] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .unwrap_or_else(|e| panic!("{table} should exist: {e}"));
            assert_eq!(count, 0);
        }
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = mem_db();
        assert_eq!(run_migrations(&conn).unwrap(), 1);
        assert_eq!(run_migrations(&conn).unwrap(), 0);
    }

    #[test]
    fn test_snapshot_copies_file_backed_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.db");
        let conn = Connection::open(&path).unwrap();
        run_migrations(&conn).unwrap();
        conn.execute("INSERT INTO teams (name) VALUES ('Lab A')", []).unwrap();

        snapshot_before_upgrade(&conn, 1).unwrap();
        let copy = Connection::open(dir.path().join("lab.db.v1.bak")).unwrap();
        let teams: i64 = copy
            .query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))
            .unwrap();
        assert_eq!(teams, 1);

        snapshot_before_upgrade(&mem_db(), 1).unwrap();
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let conn = mem_db();
        run_migrations(&conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (999)", [])
            .unwrap();
        let err = run_migrations(&conn).unwrap_err();
        assert!(err.contains("only knows up to v1"));
    }

    #[test]
    fn test_custom_id_unique_per_category() {
        let conn = mem_db();
        run_migrations(&conn).unwrap();
        let insert = "INSERT INTO experiments (team, userid, title, date, elabid, custom_id, category,
                          canread, canwrite, created_at, modified_at)
                      VALUES (1, 1, 't', '2024-01-01', ?1, ?2, ?3, '{}', '{}', 'now', 'now')";
        conn.execute(insert, rusqlite::params!["a", 1, 7]).unwrap();
        conn.execute(insert, rusqlite::params!["b", 1, 8]).unwrap();
        conn.execute(insert, rusqlite::params!["c", None::<i64>, 7]).unwrap();
        conn.execute(insert, rusqlite::params!["d", None::<i64>, 7]).unwrap();
        assert!(conn.execute(insert, rusqlite::params!["e", 1, 7]).is_err());
        assert!(conn.execute(insert, rusqlite::params!["a", 2, 7]).is_err());
    }
}
