use super::*;

use crate::entity::{EntityType, LinkKind, State};

impl LabDb {
    // =========================================================================
    // Links to items and experiments
    // =========================================================================

    /// Record that `(kind, entity_id)` references `link_id`. Idempotent.
    pub fn add_link(
        &self,
        kind: EntityType,
        entity_id: i64,
        link_kind: LinkKind,
        link_id: i64,
    ) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "INSERT OR IGNORE INTO entity_links (entity_type, item_id, link_type, link_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![kind.as_str(), entity_id, link_kind.as_str(), link_id],
        )?)
    }

    pub fn remove_link(
        &self,
        kind: EntityType,
        entity_id: i64,
        link_kind: LinkKind,
        link_id: i64,
    ) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "DELETE FROM entity_links
             WHERE entity_type = ?1 AND item_id = ?2 AND link_type = ?3 AND link_id = ?4",
            params![kind.as_str(), entity_id, link_kind.as_str(), link_id],
        )?)
    }

    /// Links of one target class, skipping targets that were deleted.
    pub fn get_entity_links(
        &self,
        kind: EntityType,
        entity_id: i64,
        link_kind: LinkKind,
    ) -> Result<Vec<DbLink>, DbError> {
        let sql = format!(
            "SELECT l.link_id, t.title, t.elabid
             FROM entity_links l
             JOIN {} t ON t.id = l.link_id
             WHERE l.entity_type = ?1 AND l.item_id = ?2 AND l.link_type = ?3
               AND t.state != ?4
             ORDER BY t.title COLLATE NOCASE, l.link_id",
            link_kind.target_type().table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                kind.as_str(),
                entity_id,
                link_kind.as_str(),
                State::Deleted.as_i64()
            ],
            |row| {
                Ok(DbLink {
                    link_type: link_kind,
                    link_id: row.get(0)?,
                    title: row.get(1)?,
                    elabid: row.get(2)?,
                })
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Copy every link (both target classes) onto another entity.
    pub fn duplicate_links(
        &self,
        from: (EntityType, i64),
        to: (EntityType, i64),
    ) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "INSERT OR IGNORE INTO entity_links (entity_type, item_id, link_type, link_id)
             SELECT ?3, ?4, link_type, link_id FROM entity_links
             WHERE entity_type = ?1 AND item_id = ?2",
            params![from.0.as_str(), from.1, to.0.as_str(), to.1],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::entities::tests::sample_entity;
    use super::super::test_utils::test_db;
    use super::*;

    /// Raw link rows, including links to deleted or missing targets.
    fn count_links(db: &LabDb, kind: EntityType, entity_id: i64, link_kind: LinkKind) -> i64 {
        db.conn_ref()
            .query_row(
                "SELECT COUNT(*) FROM entity_links
                 WHERE entity_type = ?1 AND item_id = ?2 AND link_type = ?3",
                params![kind.as_str(), entity_id, link_kind.as_str()],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn test_links_resolve_titles_and_skip_deleted_targets() {
        let db = test_db();
        let antibody = db.insert_entity(EntityType::Item, &sample_entity(1, 1, "Antibody")).unwrap();
        let buffer = db.insert_entity(EntityType::Item, &sample_entity(1, 1, "Buffer")).unwrap();
        let exp = db.insert_entity(EntityType::Experiment, &sample_entity(1, 1, "Blot")).unwrap();

        db.add_link(EntityType::Experiment, exp, LinkKind::Items, antibody).unwrap();
        db.add_link(EntityType::Experiment, exp, LinkKind::Items, buffer).unwrap();
        db.add_link(EntityType::Experiment, exp, LinkKind::Items, buffer).unwrap();

        let links = db.get_entity_links(EntityType::Experiment, exp, LinkKind::Items).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].title, "Antibody");

        db.set_entity_state(EntityType::Item, buffer, State::Deleted).unwrap();
        let links = db.get_entity_links(EntityType::Experiment, exp, LinkKind::Items).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(count_links(&db, EntityType::Experiment, exp, LinkKind::Items), 2);
    }

    #[test]
    fn test_duplicate_links_copies_both_classes() {
        let db = test_db();
        db.add_link(EntityType::Template, 1, LinkKind::Items, 5).unwrap();
        db.add_link(EntityType::Template, 1, LinkKind::Experiments, 6).unwrap();
        let copied = db
            .duplicate_links((EntityType::Template, 1), (EntityType::Experiment, 9))
            .unwrap();
        assert_eq!(copied, 2);
        assert_eq!(count_links(&db, EntityType::Experiment, 9, LinkKind::Items), 1);
        assert_eq!(count_links(&db, EntityType::Experiment, 9, LinkKind::Experiments), 1);
    }
}
