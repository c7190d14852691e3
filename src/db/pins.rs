use super::*;

use crate::entity::EntityType;

impl LabDb {
    // =========================================================================
    // Pins
    // =========================================================================

    pub fn pin_entity(&self, user: i64, kind: EntityType, entity_id: i64) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO pin2users (users_id, entity_type, entity_id) VALUES (?1, ?2, ?3)",
            params![user, kind.as_str(), entity_id],
        )?;
        Ok(())
    }

    pub fn unpin_entity(&self, user: i64, kind: EntityType, entity_id: i64) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "DELETE FROM pin2users WHERE users_id = ?1 AND entity_type = ?2 AND entity_id = ?3",
            params![user, kind.as_str(), entity_id],
        )?)
    }

    pub fn is_pinned(&self, user: i64, kind: EntityType, entity_id: i64) -> Result<bool, DbError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pin2users WHERE users_id = ?1 AND entity_type = ?2 AND entity_id = ?3",
            params![user, kind.as_str(), entity_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Pins of a user, optionally restricted to one kind.
    pub fn get_pins_for_user(&self, user: i64, kind: Option<EntityType>) -> Result<Vec<DbPin>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_type, entity_id FROM pin2users
             WHERE users_id = ?1 AND (?2 IS NULL OR entity_type = ?2)
             ORDER BY entity_type, entity_id",
        )?;
        let rows = stmt.query_map(params![user, kind.map(|k| k.as_str())], |row| {
            let label: String = row.get(0)?;
            Ok((label, row.get::<_, i64>(1)?))
        })?;
        let mut pins = Vec::new();
        for row in rows {
            let (label, entity_id) = row?;
            match EntityType::from_str_opt(&label) {
                Some(entity_type) => pins.push(DbPin {
                    entity_type,
                    entity_id,
                }),
                None => log::warn!("Skipping pin with unknown entity type '{}'", label),
            }
        }
        Ok(pins)
    }

    /// Drop every user's pin on an entity. Returns pins removed.
    pub fn cleanup_pins_for_entity(&self, kind: EntityType, entity_id: i64) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "DELETE FROM pin2users WHERE entity_type = ?1 AND entity_id = ?2",
            params![kind.as_str(), entity_id],
        )?)
    }
}
