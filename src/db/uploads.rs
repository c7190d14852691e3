use super::*;

use serde::Deserialize;

use crate::entity::{EntityType, State};

/// Metadata of a file already placed in external storage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUpload {
    pub real_name: String,
    pub long_name: String,
    pub hash: Option<String>,
    pub filesize: Option<i64>,
    pub comment: Option<String>,
}

impl LabDb {
    // =========================================================================
    // Upload records
    // =========================================================================

    pub fn add_upload_record(
        &self,
        kind: EntityType,
        entity_id: i64,
        userid: i64,
        upload: &NewUpload,
    ) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO uploads (entity_type, item_id, real_name, long_name, hash,
                                  filesize, comment, userid, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                kind.as_str(),
                entity_id,
                upload.real_name,
                upload.long_name,
                upload.hash,
                upload.filesize,
                upload.comment,
                userid,
                crate::util::now_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Live (state normal) uploads of an entity, oldest first.
    pub fn get_entity_uploads(&self, kind: EntityType, entity_id: i64) -> Result<Vec<DbUpload>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, real_name, long_name, hash, filesize, comment, userid, created_at
             FROM uploads
             WHERE entity_type = ?1 AND item_id = ?2 AND state = ?3
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(
            params![kind.as_str(), entity_id, State::Normal.as_i64()],
            |row| {
                Ok(DbUpload {
                    id: row.get(0)?,
                    real_name: row.get(1)?,
                    long_name: row.get(2)?,
                    hash: row.get(3)?,
                    filesize: row.get(4)?,
                    comment: row.get(5)?,
                    userid: row.get(6)?,
                    created_at: row.get(7)?,
                })
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Copy live upload records onto another entity. The copies point at the
    /// same stored files and are owned by `userid`.
    pub fn duplicate_uploads(
        &self,
        from: (EntityType, i64),
        to: (EntityType, i64),
        userid: i64,
    ) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "INSERT INTO uploads (entity_type, item_id, real_name, long_name, hash,
                                  filesize, comment, userid, created_at)
             SELECT ?3, ?4, real_name, long_name, hash, filesize, comment, ?5, ?6
             FROM uploads
             WHERE entity_type = ?1 AND item_id = ?2 AND state = ?7
             ORDER BY id",
            params![
                from.0.as_str(),
                from.1,
                to.0.as_str(),
                to.1,
                userid,
                crate::util::now_rfc3339(),
                State::Normal.as_i64(),
            ],
        )?)
    }
}
