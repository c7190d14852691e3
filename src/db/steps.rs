use super::*;

use rusqlite::OptionalExtension;

use crate::entity::EntityType;

impl LabDb {
    // =========================================================================
    // Steps
    // =========================================================================

    fn map_step_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbStep> {
        Ok(DbStep {
            id: row.get(0)?,
            ordering: row.get(1)?,
            body: row.get(2)?,
            finished: row.get::<_, i64>(3)? != 0,
            finished_time: row.get(4)?,
            deadline: row.get(5)?,
        })
    }

    /// Append a step after the entity's last one.
    pub fn add_step(&self, kind: EntityType, entity_id: i64, body: &str) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO steps (entity_type, item_id, ordering, body)
             VALUES (?1, ?2,
                     (SELECT COALESCE(MAX(ordering), 0) + 1 FROM steps
                      WHERE entity_type = ?1 AND item_id = ?2),
                     ?3)",
            params![kind.as_str(), entity_id, body],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_entity_steps(&self, kind: EntityType, entity_id: i64) -> Result<Vec<DbStep>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ordering, body, finished, finished_time, deadline
             FROM steps
             WHERE entity_type = ?1 AND item_id = ?2
             ORDER BY ordering ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![kind.as_str(), entity_id], Self::map_step_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Flip the finished flag of a step. Returns the new step, or `None` if
    /// the step does not belong to the entity.
    pub fn toggle_step(
        &self,
        kind: EntityType,
        entity_id: i64,
        step_id: i64,
    ) -> Result<Option<DbStep>, DbError> {
        let changed = self.conn.execute(
            "UPDATE steps SET
                finished = 1 - finished,
                finished_time = CASE WHEN finished = 0 THEN ?4 ELSE NULL END
             WHERE id = ?1 AND entity_type = ?2 AND item_id = ?3",
            params![step_id, kind.as_str(), entity_id, crate::util::now_rfc3339()],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(self
            .conn
            .query_row(
                "SELECT id, ordering, body, finished, finished_time, deadline
                 FROM steps WHERE id = ?1",
                params![step_id],
                Self::map_step_row,
            )
            .optional()?)
    }

    /// Copy steps onto another entity, keeping body, order and deadline.
    /// Copies start unfinished.
    pub fn duplicate_steps(
        &self,
        from: (EntityType, i64),
        to: (EntityType, i64),
    ) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "INSERT INTO steps (entity_type, item_id, ordering, body, deadline)
             SELECT ?3, ?4, ordering, body, deadline FROM steps
             WHERE entity_type = ?1 AND item_id = ?2
             ORDER BY ordering, id",
            params![from.0.as_str(), from.1, to.0.as_str(), to.1],
        )?)
    }
}
