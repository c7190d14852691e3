//! SQLite-backed store for teams, entities and their child records.
//!
//! One `LabDb` wraps one connection. Statements are parameterized and built
//! per call; entity tables are selected by `EntityType::table()`, which only
//! ever yields one of four static names.

use std::path::PathBuf;

use rusqlite::{params, Connection};

use crate::types::Config;

pub mod types;
pub use types::*;

pub struct LabDb {
    conn: Connection,
}

impl LabDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err. When a transaction is already open
    /// the closure joins it instead of nesting.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        if !self.conn.is_autocommit() {
            return f(self);
        }
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(DbError::Sqlite(e)))?;
        match f(self) {
            Ok(val) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|e| E::from(DbError::Sqlite(e)))?;
                Ok(val)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    log::warn!("Rollback failed: {rollback}");
                }
                Err(e)
            }
        }
    }

    /// Open (or create) the database named by the config, applying the schema.
    pub fn open(config: &Config) -> Result<Self, DbError> {
        let path = match &config.database_path {
            Some(p) => PathBuf::from(p),
            None => Self::default_path()?,
        };
        Self::open_at(path)
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL for concurrent readers; writers serialize on BEGIN IMMEDIATE.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.benchbook/benchbook.db`.
    pub fn default_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".benchbook").join("benchbook.db"))
    }

    /// Count rows of a table matching `team`. Used by reporting and tests.
    pub fn count_team_rows(&self, table: &str, team: i64) -> Result<i64, DbError> {
        let allowed = [
            "experiments",
            "items",
            "experiments_templates",
            "items_types",
            "experiments_status",
            "items_status",
            "experiments_categories",
        ];
        if !allowed.contains(&table) {
            return Err(DbError::Sqlite(rusqlite::Error::InvalidParameterName(
                format!("Table '{}' is not countable", table),
            )));
        }
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE team = ?1");
        Ok(self.conn.query_row(&sql, params![team], |row| row.get(0))?)
    }
}

pub mod edit_lease;
pub mod entities;
pub mod links;
pub mod pins;
pub mod registries;
pub mod steps;
pub mod tags;
pub mod teams;
pub mod uploads;

// =============================================================================
// Shared test utilities
// =============================================================================

#[cfg(test)]
pub mod test_utils {
    use super::LabDb;
    use crate::actor::Actor;

    /// Create a temporary database for testing.
    ///
    /// We leak the `TempDir` so the directory persists for the duration of the test.
    /// FK enforcement is disabled so that storage-level tests can insert rows
    /// without seeding teams and users first.
    pub fn test_db() -> LabDb {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        let db = LabDb::open_at(path).expect("Failed to open test database");
        db.conn_ref()
            .execute_batch("PRAGMA foreign_keys = OFF;")
            .expect("disable FK for tests");
        db
    }

    /// A seeded team with an admin, a plain member and an outsider from
    /// another team.
    pub struct Fixture {
        pub db: LabDb,
        pub team: i64,
        pub other_team: i64,
        pub admin: i64,
        pub member: i64,
        pub outsider: i64,
    }

    impl Fixture {
        pub fn new() -> Self {
            let db = test_db();
            let team = db.insert_team("Lab A").expect("team");
            let other_team = db.insert_team("Lab B").expect("other team");
            let admin = db
                .insert_user("Ada", "Admin", "ada@lab.test")
                .expect("admin");
            let member = db
                .insert_user("Max", "Member", "max@lab.test")
                .expect("member");
            let outsider = db
                .insert_user("Olga", "Outsider", "olga@lab.test")
                .expect("outsider");
            db.add_user_to_team(admin, team, true).expect("join");
            db.add_user_to_team(member, team, false).expect("join");
            db.add_user_to_team(outsider, other_team, false).expect("join");
            Self {
                db,
                team,
                other_team,
                admin,
                member,
                outsider,
            }
        }

        pub fn actor(&self, user: i64) -> Actor {
            let team = if user == self.outsider {
                self.other_team
            } else {
                self.team
            };
            self.db
                .load_actor(user, team)
                .expect("load actor")
                .expect("fixture user is a team member")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::test_db;
    use super::*;

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = test_db();
        let result: Result<(), DbError> = db.with_transaction(|tx| {
            tx.insert_team("Doomed")?;
            Err(DbError::Migration("boom".into()))
        });
        assert!(result.is_err());
        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM teams", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_nested_transaction_joins_outer() {
        let db = test_db();
        let result: Result<i64, DbError> =
            db.with_transaction(|tx| tx.with_transaction(|inner| inner.insert_team("Inner")));
        assert!(result.is_ok());
        assert!(db.conn.is_autocommit());
    }

    #[test]
    fn test_count_team_rows_rejects_unknown_table() {
        let db = test_db();
        assert!(db.count_team_rows("users", 1).is_err());
        assert_eq!(db.count_team_rows("experiments", 1).unwrap(), 0);
    }
}
