use super::*;

use rusqlite::OptionalExtension;

use crate::entity::{Registry, State};

const REGISTRY_COLUMNS: &str = "id, team, title, color, is_default, ordering, state";

impl LabDb {
    // =========================================================================
    // Status / category registries
    // =========================================================================

    fn map_registry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbStatus> {
        Ok(DbStatus {
            id: row.get(0)?,
            team: row.get(1)?,
            title: row.get(2)?,
            color: row.get(3)?,
            is_default: row.get::<_, i64>(4)? != 0,
            ordering: row.get(5)?,
            state: State::from_i64(row.get(6)?),
        })
    }

    /// Insert an entry. A new default clears the flag on the team's other rows.
    pub fn insert_registry_entry(
        &self,
        registry: Registry,
        team: i64,
        title: &str,
        color: &str,
        is_default: bool,
    ) -> Result<i64, DbError> {
        self.with_transaction(|db| {
            if is_default {
                db.clear_registry_default(registry, team)?;
            }
            let sql = format!(
                "INSERT INTO {} (team, title, color, is_default, ordering)
                 VALUES (?1, ?2, ?3, ?4,
                         (SELECT COALESCE(MAX(ordering), 0) + 1 FROM {} WHERE team = ?1))",
                registry.table(),
                registry.table()
            );
            db.conn
                .execute(&sql, params![team, title, color, is_default as i64])?;
            Ok(db.conn.last_insert_rowid())
        })
    }

    fn clear_registry_default(&self, registry: Registry, team: i64) -> Result<(), DbError> {
        let sql = format!("UPDATE {} SET is_default = 0 WHERE team = ?1", registry.table());
        self.conn.execute(&sql, params![team])?;
        Ok(())
    }

    /// Flag one entry as the team default.
    pub fn set_registry_default(&self, registry: Registry, team: i64, id: i64) -> Result<usize, DbError> {
        self.with_transaction(|db| {
            db.clear_registry_default(registry, team)?;
            let sql = format!(
                "UPDATE {} SET is_default = 1 WHERE id = ?1 AND team = ?2",
                registry.table()
            );
            Ok(db.conn.execute(&sql, params![id, team])?)
        })
    }

    /// Non-deleted entries of a team, by ordering.
    pub fn get_registry_entries(&self, registry: Registry, team: i64) -> Result<Vec<DbStatus>, DbError> {
        let sql = format!(
            "SELECT {REGISTRY_COLUMNS} FROM {} WHERE team = ?1 AND state != ?2
             ORDER BY ordering ASC, id ASC",
            registry.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![team, State::Deleted.as_i64()], Self::map_registry_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_registry_entry(&self, registry: Registry, id: i64) -> Result<Option<DbStatus>, DbError> {
        let sql = format!("SELECT {REGISTRY_COLUMNS} FROM {} WHERE id = ?1", registry.table());
        Ok(self
            .conn
            .query_row(&sql, params![id], Self::map_registry_row)
            .optional()?)
    }

    /// The flagged default of a team, if any.
    pub fn get_registry_default(&self, registry: Registry, team: i64) -> Result<Option<i64>, DbError> {
        let sql = format!(
            "SELECT id FROM {} WHERE team = ?1 AND is_default = 1 AND state != ?2
             ORDER BY id LIMIT 1",
            registry.table()
        );
        Ok(self
            .conn
            .query_row(&sql, params![team, State::Deleted.as_i64()], |row| row.get(0))
            .optional()?)
    }

    pub fn update_registry_ordering(
        &self,
        registry: Registry,
        team: i64,
        id: i64,
        ordering: i64,
    ) -> Result<usize, DbError> {
        let sql = format!(
            "UPDATE {} SET ordering = ?1 WHERE id = ?2 AND team = ?3",
            registry.table()
        );
        Ok(self.conn.execute(&sql, params![ordering, id, team])?)
    }

    pub fn set_registry_state(
        &self,
        registry: Registry,
        team: i64,
        id: i64,
        state: State,
    ) -> Result<usize, DbError> {
        let sql = format!(
            "UPDATE {} SET state = ?1, is_default = CASE WHEN ?1 = ?4 THEN 0 ELSE is_default END
             WHERE id = ?2 AND team = ?3",
            registry.table()
        );
        Ok(self.conn.execute(
            &sql,
            params![state.as_i64(), id, team, State::Deleted.as_i64()],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    #[test]
    fn test_single_default_per_team() {
        let db = test_db();
        let r = Registry::ExperimentsStatus;
        let running = db.insert_registry_entry(r, 1, "Running", "29aeb9", true).unwrap();
        let success = db.insert_registry_entry(r, 1, "Success", "54aa08", true).unwrap();
        db.insert_registry_entry(r, 2, "Other team", "000000", true).unwrap();

        assert_eq!(db.get_registry_default(r, 1).unwrap(), Some(success));
        let running_row = db.get_registry_entry(r, running).unwrap().unwrap();
        assert!(!running_row.is_default);

        db.set_registry_default(r, 1, running).unwrap();
        assert_eq!(db.get_registry_default(r, 1).unwrap(), Some(running));
    }

    #[test]
    fn test_entries_are_appended_in_order() {
        let db = test_db();
        let r = Registry::ItemsStatus;
        db.insert_registry_entry(r, 1, "In stock", "aaaaaa", false).unwrap();
        db.insert_registry_entry(r, 1, "Ordered", "bbbbbb", false).unwrap();
        let titles: Vec<String> = db
            .get_registry_entries(r, 1)
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["In stock", "Ordered"]);
    }

    #[test]
    fn test_deleted_entry_loses_default_and_listing() {
        let db = test_db();
        let r = Registry::ExperimentsCategories;
        let id = db.insert_registry_entry(r, 1, "Cloning", "ff0000", true).unwrap();
        db.set_registry_state(r, 1, id, State::Deleted).unwrap();
        assert!(db.get_registry_entries(r, 1).unwrap().is_empty());
        assert_eq!(db.get_registry_default(r, 1).unwrap(), None);
    }
}
