use super::*;

use chrono::{DateTime, Duration, Utc};

use crate::entity::EntityType;

impl LabDb {
    // =========================================================================
    // Exclusive edit leases
    // =========================================================================

    /// Take (or renew) the lease on an entity for `minutes`, replacing any
    /// previous holder.
    pub fn acquire_edit_lease(
        &self,
        kind: EntityType,
        entity_id: i64,
        user: i64,
        now: DateTime<Utc>,
        minutes: i64,
    ) -> Result<(), DbError> {
        let expires = Duration::try_minutes(minutes)
            .and_then(|length| now.checked_add_signed(length))
            .ok_or(DbError::LeaseOutOfRange(minutes))?;
        self.conn.execute(
            "INSERT INTO exclusive_edit_mode (entity_type, entity_id, locked_by, locked_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                locked_by = excluded.locked_by,
                locked_at = excluded.locked_at,
                expires_at = excluded.expires_at",
            params![
                kind.as_str(),
                entity_id,
                user,
                now.to_rfc3339(),
                expires.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// The lease on an entity if one is held and has not expired at `now`.
    pub fn get_active_edit_lease(
        &self,
        kind: EntityType,
        entity_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<DbEditLease>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT m.locked_by, u.firstname, u.lastname, m.locked_at, m.expires_at
             FROM exclusive_edit_mode m
             LEFT JOIN users u ON u.id = m.locked_by
             WHERE m.entity_type = ?1 AND m.entity_id = ?2",
        )?;
        let mut rows = stmt.query_map(params![kind.as_str(), entity_id], |row| {
            let locked_by: i64 = row.get(0)?;
            let first: Option<String> = row.get(1)?;
            let last: Option<String> = row.get(2)?;
            let locked_by_name = match (first, last) {
                (Some(f), Some(l)) => format!("{} {}", f, l),
                _ => format!("user #{}", locked_by),
            };
            Ok(DbEditLease {
                locked_by,
                locked_by_name,
                locked_at: row.get(3)?,
                expires_at: row.get(4)?,
            })
        })?;
        let Some(lease) = rows.next() else {
            return Ok(None);
        };
        let lease = lease?;
        match DateTime::parse_from_rfc3339(&lease.expires_at) {
            Ok(expires) if expires.with_timezone(&Utc) > now => Ok(Some(lease)),
            Ok(_) => Ok(None),
            Err(e) => {
                log::warn!(
                    "Ignoring edit lease on {} {} with unreadable expiry '{}': {}",
                    kind.as_str(),
                    entity_id,
                    lease.expires_at,
                    e
                );
                Ok(None)
            }
        }
    }

    /// Drop the lease on an entity. Returns rows removed.
    pub fn release_edit_lease(&self, kind: EntityType, entity_id: i64) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "DELETE FROM exclusive_edit_mode WHERE entity_type = ?1 AND entity_id = ?2",
            params![kind.as_str(), entity_id],
        )?)
    }
}
