use super::*;

use crate::entity::EntityType;

impl LabDb {
    // =========================================================================
    // Tags
    // =========================================================================

    /// Attach a tag to an entity, creating the team tag if needed.
    /// Re-attaching an existing tag is a no-op. Returns the tag id.
    pub fn add_tag_to_entity(
        &self,
        team: i64,
        kind: EntityType,
        entity_id: i64,
        tag: &str,
    ) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO tags (team, tag) VALUES (?1, ?2)",
            params![team, tag],
        )?;
        let tag_id: i64 = self.conn.query_row(
            "SELECT id FROM tags WHERE team = ?1 AND tag = ?2",
            params![team, tag],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT OR IGNORE INTO tags2entity (entity_type, item_id, tag_id) VALUES (?1, ?2, ?3)",
            params![kind.as_str(), entity_id, tag_id],
        )?;
        Ok(tag_id)
    }

    pub fn remove_tag_from_entity(
        &self,
        kind: EntityType,
        entity_id: i64,
        tag_id: i64,
    ) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "DELETE FROM tags2entity WHERE entity_type = ?1 AND item_id = ?2 AND tag_id = ?3",
            params![kind.as_str(), entity_id, tag_id],
        )?)
    }

    /// Tags of an entity, alphabetically.
    pub fn get_entity_tags(&self, kind: EntityType, entity_id: i64) -> Result<Vec<DbTag>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.tag
             FROM tags2entity te
             JOIN tags t ON t.id = te.tag_id
             WHERE te.entity_type = ?1 AND te.item_id = ?2
             ORDER BY t.tag COLLATE NOCASE",
        )?;
        let rows = stmt.query_map(params![kind.as_str(), entity_id], |row| {
            Ok(DbTag {
                tag_id: row.get(0)?,
                tag: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Copy every tag of one entity onto another. Returns tags copied.
    pub fn copy_tags(
        &self,
        from: (EntityType, i64),
        to: (EntityType, i64),
    ) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "INSERT OR IGNORE INTO tags2entity (entity_type, item_id, tag_id)
             SELECT ?3, ?4, tag_id FROM tags2entity WHERE entity_type = ?1 AND item_id = ?2",
            params![from.0.as_str(), from.1, to.0.as_str(), to.1],
        )?)
    }
}
