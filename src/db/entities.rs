use super::*;

use rusqlite::OptionalExtension;

use crate::entity::{ContentType, EntityType, State};
use crate::permissions::Permission;

const ENTITY_COLUMNS: &str = "id, team, userid, title, body, content_type, category, status,
    date, elabid, custom_id, canread, canwrite, canread_target, canwrite_target,
    metadata, state, color, ordering, created_at, modified_at";

impl LabDb {
    // =========================================================================
    // Entities (experiments, items, templates, items types)
    // =========================================================================

    /// Helper: map a row selected with `ENTITY_COLUMNS` to `EntityRecord`.
    fn map_entity_row(
        entity_type: EntityType,
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<EntityRecord> {
        let canread: String = row.get(11)?;
        let canwrite: String = row.get(12)?;
        let canread_target: String = row.get(13)?;
        let canwrite_target: String = row.get(14)?;
        Ok(EntityRecord {
            id: row.get(0)?,
            entity_type,
            team: row.get(1)?,
            userid: row.get(2)?,
            title: row.get(3)?,
            body: row.get(4)?,
            content_type: ContentType::from_i64(row.get(5)?),
            category: row.get(6)?,
            status: row.get(7)?,
            date: row.get(8)?,
            elabid: row.get(9)?,
            custom_id: row.get(10)?,
            canread: Permission::from_json_lossy(&canread),
            canwrite: Permission::from_json_lossy(&canwrite),
            canread_target: Permission::from_json_lossy(&canread_target),
            canwrite_target: Permission::from_json_lossy(&canwrite_target),
            metadata: row.get(15)?,
            state: State::from_i64(row.get(16)?),
            color: row.get(17)?,
            ordering: row.get(18)?,
            created_at: row.get(19)?,
            modified_at: row.get(20)?,
        })
    }

    /// Insert a new entity row and return its id.
    pub fn insert_entity(&self, kind: EntityType, entity: &NewEntity) -> Result<i64, DbError> {
        let now = crate::util::now_rfc3339();
        let sql = format!(
            "INSERT INTO {} (
                team, userid, title, body, content_type, category, status, date,
                elabid, custom_id, canread, canwrite, canread_target, canwrite_target,
                metadata, state, color, created_at, modified_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 1, ?16, ?17, ?17)",
            kind.table()
        );
        self.conn.execute(
            &sql,
            params![
                entity.team,
                entity.userid,
                entity.title,
                entity.body,
                entity.content_type.as_i64(),
                entity.category,
                entity.status,
                entity.date,
                entity.elabid,
                entity.custom_id,
                entity.canread.to_json(),
                entity.canwrite.to_json(),
                entity.canread_target.to_json(),
                entity.canwrite_target.to_json(),
                entity.metadata,
                entity.color,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Fetch an entity by id, whatever its state.
    pub fn get_entity(&self, kind: EntityType, id: i64) -> Result<Option<EntityRecord>, DbError> {
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM {} WHERE id = ?1", kind.table());
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], |row| Self::map_entity_row(kind, row))?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Rows in `state` that belong to `team` or are shared beyond it through
    /// an organization/public descriptor. Callers still filter on
    /// `can_perform`. Newest first.
    pub fn get_entities_visible_from_team(
        &self,
        kind: EntityType,
        team: i64,
        state: State,
    ) -> Result<Vec<EntityRecord>, DbError> {
        let wide = [
            Permission::Public.to_json(),
            Permission::Organization.to_json(),
        ];
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM {}
             WHERE state = ?2
               AND (team = ?1 OR canread IN (?3, ?4) OR canwrite IN (?3, ?4))
             ORDER BY date DESC, id DESC",
            kind.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![team, state.as_i64(), wide[0], wide[1]],
            |row| Self::map_entity_row(kind, row),
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Non-deleted rows of a team by explicit ordering (categories listing).
    pub fn get_entities_by_ordering(
        &self,
        kind: EntityType,
        team: i64,
    ) -> Result<Vec<EntityRecord>, DbError> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM {}
             WHERE team = ?1 AND state != ?2
             ORDER BY COALESCE(ordering, 0) ASC, id ASC",
            kind.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![team, State::Deleted.as_i64()], |row| {
            Self::map_entity_row(kind, row)
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Move an entity to a new lifecycle state. Returns rows changed.
    pub fn set_entity_state(&self, kind: EntityType, id: i64, state: State) -> Result<usize, DbError> {
        let sql = format!(
            "UPDATE {} SET state = ?1, modified_at = ?2 WHERE id = ?3",
            kind.table()
        );
        Ok(self
            .conn
            .execute(&sql, params![state.as_i64(), crate::util::now_rfc3339(), id])?)
    }

    /// Apply a partial update. `elabid` is never touched.
    pub fn update_entity(&self, kind: EntityType, id: i64, patch: &EntityPatch) -> Result<usize, DbError> {
        let sql = format!(
            "UPDATE {} SET
                title = COALESCE(?2, title),
                body = COALESCE(?3, body),
                date = COALESCE(?4, date),
                category = COALESCE(?5, category),
                status = COALESCE(?6, status),
                canread = COALESCE(?7, canread),
                canwrite = COALESCE(?8, canwrite),
                canread_target = COALESCE(?9, canread_target),
                canwrite_target = COALESCE(?10, canwrite_target),
                metadata = COALESCE(?11, metadata),
                custom_id = COALESCE(?12, custom_id),
                content_type = COALESCE(?13, content_type),
                color = COALESCE(?14, color),
                modified_at = ?15
             WHERE id = ?1",
            kind.table()
        );
        Ok(self.conn.execute(
            &sql,
            params![
                id,
                patch.title,
                patch.body,
                patch.date.map(|d| d.format("%Y-%m-%d").to_string()),
                patch.category,
                patch.status,
                patch.canread.map(|p| p.to_json()),
                patch.canwrite.map(|p| p.to_json()),
                patch.canread_target.map(|p| p.to_json()),
                patch.canwrite_target.map(|p| p.to_json()),
                patch.metadata,
                patch.custom_id,
                patch.content_type.map(|c| c.as_i64()),
                patch.color,
                crate::util::now_rfc3339(),
            ],
        )?)
    }

    /// Next custom id within `(team, category)`.
    ///
    /// `None` when there is no category, or when no row of the category
    /// carries a custom id yet. Gaps are tolerated; uniqueness is enforced
    /// by the `(team, category, custom_id)` index.
    pub fn next_custom_id(
        &self,
        kind: EntityType,
        team: i64,
        category: Option<i64>,
    ) -> Result<Option<i64>, DbError> {
        let Some(category) = category else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT MAX(custom_id) FROM {} WHERE team = ?1 AND category = ?2",
            kind.table()
        );
        let max: Option<i64> = self
            .conn
            .query_row(&sql, params![team, category], |row| row.get(0))?;
        Ok(max.map(|m| m + 1))
    }

    /// Exact-title lookup within a team, ignoring deleted rows.
    pub fn find_entity_id_by_title(
        &self,
        kind: EntityType,
        team: i64,
        title: &str,
    ) -> Result<Option<i64>, DbError> {
        let sql = format!(
            "SELECT id FROM {} WHERE team = ?1 AND title = ?2 AND state != ?3
             ORDER BY id LIMIT 1",
            kind.table()
        );
        Ok(self
            .conn
            .query_row(&sql, params![team, title, State::Deleted.as_i64()], |row| {
                row.get(0)
            })
            .optional()?)
    }

    /// First non-deleted row of a team by id.
    pub fn first_entity_id(&self, kind: EntityType, team: i64) -> Result<Option<i64>, DbError> {
        let sql = format!(
            "SELECT id FROM {} WHERE team = ?1 AND state != ?2 ORDER BY id LIMIT 1",
            kind.table()
        );
        Ok(self
            .conn
            .query_row(&sql, params![team, State::Deleted.as_i64()], |row| row.get(0))
            .optional()?)
    }

    /// Set the position of one row, scoped to its team. Returns rows changed.
    pub fn update_entity_ordering(
        &self,
        kind: EntityType,
        team: i64,
        id: i64,
        ordering: i64,
    ) -> Result<usize, DbError> {
        let sql = format!(
            "UPDATE {} SET ordering = ?1 WHERE id = ?2 AND team = ?3",
            kind.table()
        );
        Ok(self.conn.execute(&sql, params![ordering, id, team])?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    pub(crate) fn sample_entity(team: i64, userid: i64, title: &str) -> NewEntity {
        NewEntity {
            team,
            userid,
            title: title.to_string(),
            body: None,
            content_type: ContentType::Html,
            category: None,
            status: None,
            date: "2024-03-01".to_string(),
            elabid: format!("20240301-{}", uuid::Uuid::new_v4().simple()),
            custom_id: None,
            canread: Permission::Team,
            canwrite: Permission::User,
            canread_target: Permission::Team,
            canwrite_target: Permission::User,
            metadata: None,
            color: None,
        }
    }

    #[test]
    fn test_insert_and_get_entity() {
        let db = test_db();
        let mut new = sample_entity(1, 1, "PCR run");
        new.body = Some("<p>mix</p>".into());
        new.canread = Permission::Group(4);
        let id = db.insert_entity(EntityType::Experiment, &new).unwrap();

        let row = db.get_entity(EntityType::Experiment, id).unwrap().unwrap();
        assert_eq!(row.title, "PCR run");
        assert_eq!(row.body.as_deref(), Some("<p>mix</p>"));
        assert_eq!(row.canread, Permission::Group(4));
        assert_eq!(row.state, State::Normal);
        assert_eq!(row.elabid, new.elabid);
        assert!(db.get_entity(EntityType::Item, id).unwrap().is_none());
    }

    #[test]
    fn test_next_custom_id_per_category() {
        let db = test_db();
        let kind = EntityType::Item;
        assert_eq!(db.next_custom_id(kind, 1, None).unwrap(), None);
        assert_eq!(db.next_custom_id(kind, 1, Some(3)).unwrap(), None);

        let mut a = sample_entity(1, 1, "a");
        a.category = Some(3);
        a.custom_id = Some(7);
        db.insert_entity(kind, &a).unwrap();
        let mut b = sample_entity(1, 1, "b");
        b.category = Some(4);
        b.custom_id = Some(40);
        db.insert_entity(kind, &b).unwrap();

        assert_eq!(db.next_custom_id(kind, 1, Some(3)).unwrap(), Some(8));
        assert_eq!(db.next_custom_id(kind, 1, Some(4)).unwrap(), Some(41));
        assert_eq!(db.next_custom_id(kind, 2, Some(3)).unwrap(), None);
    }

    #[test]
    fn test_state_filter_and_visibility() {
        let db = test_db();
        let kind = EntityType::Experiment;
        let kept = db.insert_entity(kind, &sample_entity(1, 1, "kept")).unwrap();
        let gone = db.insert_entity(kind, &sample_entity(1, 1, "gone")).unwrap();
        let mut shared = sample_entity(2, 5, "shared");
        shared.canread = Permission::Organization;
        let shared = db.insert_entity(kind, &shared).unwrap();
        db.insert_entity(kind, &sample_entity(2, 5, "private")).unwrap();

        db.set_entity_state(kind, gone, State::Deleted).unwrap();

        let ids: Vec<i64> = db
            .get_entities_visible_from_team(kind, 1, State::Normal)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert!(ids.contains(&kept));
        assert!(ids.contains(&shared));
        assert!(!ids.contains(&gone));
        assert_eq!(ids.len(), 2);

        // Row is still there.
        let row = db.get_entity(kind, gone).unwrap().unwrap();
        assert_eq!(row.state, State::Deleted);
    }

    #[test]
    fn test_update_entity_is_partial() {
        let db = test_db();
        let kind = EntityType::Template;
        let id = db.insert_entity(kind, &sample_entity(1, 1, "tpl")).unwrap();
        let before = db.get_entity(kind, id).unwrap().unwrap();
        db.update_entity(
            kind,
            id,
            &EntityPatch {
                body: Some("new body".into()),
                canwrite: Some(Permission::Team),
                ..Default::default()
            },
        )
        .unwrap();
        let after = db.get_entity(kind, id).unwrap().unwrap();
        assert_eq!(after.title, "tpl");
        assert_eq!(after.body.as_deref(), Some("new body"));
        assert_eq!(after.canwrite, Permission::Team);
        assert_eq!(after.elabid, before.elabid);
    }

    #[test]
    fn test_title_lookup_and_ordering() {
        let db = test_db();
        let kind = EntityType::ItemType;
        let a = db.insert_entity(kind, &sample_entity(1, 1, "Antibody")).unwrap();
        let b = db.insert_entity(kind, &sample_entity(1, 1, "Plasmid")).unwrap();
        assert_eq!(db.find_entity_id_by_title(kind, 1, "Plasmid").unwrap(), Some(b));
        assert_eq!(db.find_entity_id_by_title(kind, 1, "plasmid").unwrap(), None);
        assert_eq!(db.first_entity_id(kind, 1).unwrap(), Some(a));

        db.update_entity_ordering(kind, 1, a, 2).unwrap();
        db.update_entity_ordering(kind, 1, b, 1).unwrap();
        // Wrong team: no effect.
        assert_eq!(db.update_entity_ordering(kind, 9, a, 0).unwrap(), 0);

        let titles: Vec<String> = db
            .get_entities_by_ordering(kind, 1)
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["Plasmid", "Antibody"]);
    }
}
