use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{ContentType, EntityType, LinkKind, State};
use crate::permissions::{AccessTarget, Permission};

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Edit lease of {0} minutes is out of range")]
    LeaseOutOfRange(i64),
}

impl DbError {
    /// True when the statement hit a UNIQUE index. Foreign key, NOT NULL
    /// and CHECK failures do not count.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            DbError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}

/// A row from any of the four entity tables.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub id: i64,
    pub entity_type: EntityType,
    pub team: i64,
    pub userid: i64,
    pub title: String,
    pub body: Option<String>,
    pub content_type: ContentType,
    pub category: Option<i64>,
    pub status: Option<i64>,
    pub date: String,
    pub elabid: String,
    pub custom_id: Option<i64>,
    pub canread: Permission,
    pub canwrite: Permission,
    pub canread_target: Permission,
    pub canwrite_target: Permission,
    pub metadata: Option<String>,
    pub state: State,
    pub color: Option<String>,
    pub ordering: Option<i64>,
    pub created_at: String,
    pub modified_at: String,
}

impl EntityRecord {
    pub fn access_target(&self) -> AccessTarget {
        AccessTarget {
            owner: self.userid,
            team: self.team,
            can_read: self.canread,
            can_write: self.canwrite,
        }
    }
}

/// Values for a new entity row. `id`, timestamps and state are assigned by
/// the insert.
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub team: i64,
    pub userid: i64,
    pub title: String,
    pub body: Option<String>,
    pub content_type: ContentType,
    pub category: Option<i64>,
    pub status: Option<i64>,
    pub date: String,
    pub elabid: String,
    pub custom_id: Option<i64>,
    pub canread: Permission,
    pub canwrite: Permission,
    pub canread_target: Permission,
    pub canwrite_target: Permission,
    pub metadata: Option<String>,
    pub color: Option<String>,
}

/// Partial update of an entity. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub date: Option<chrono::NaiveDate>,
    pub category: Option<i64>,
    pub status: Option<i64>,
    pub canread: Option<Permission>,
    pub canwrite: Option<Permission>,
    pub canread_target: Option<Permission>,
    pub canwrite_target: Option<Permission>,
    pub metadata: Option<String>,
    pub custom_id: Option<i64>,
    pub content_type: Option<ContentType>,
    pub color: Option<String>,
}

impl EntityPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.date.is_none()
            && self.category.is_none()
            && self.status.is_none()
            && self.canread.is_none()
            && self.canwrite.is_none()
            && self.canread_target.is_none()
            && self.canwrite_target.is_none()
            && self.metadata.is_none()
            && self.custom_id.is_none()
            && self.content_type.is_none()
            && self.color.is_none()
    }
}

/// A row from the `teams` table: per-team configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbTeam {
    pub id: i64,
    pub name: String,
    pub force_exp_tpl: bool,
    pub do_force_canread: bool,
    pub force_canread: Permission,
    pub do_force_canwrite: bool,
    pub force_canwrite: Permission,
    pub common_template: Option<String>,
    pub common_template_md: Option<String>,
}

impl DbTeam {
    /// Apply team-level forced permissions over computed ones.
    pub fn enforce_permissions(&self, canread: Permission, canwrite: Permission) -> (Permission, Permission) {
        let read = if self.do_force_canread { self.force_canread } else { canread };
        let write = if self.do_force_canwrite { self.force_canwrite } else { canwrite };
        (read, write)
    }

    pub fn common_body(&self, use_markdown: bool) -> Option<String> {
        if use_markdown {
            self.common_template_md.clone()
        } else {
            self.common_template.clone()
        }
    }
}

/// A row from the `users` table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbUser {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub use_markdown: bool,
    pub default_read: Option<Permission>,
    pub default_write: Option<Permission>,
    pub is_sysadmin: bool,
}

/// A row from `team_groups`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbTeamGroup {
    pub id: i64,
    pub team: i64,
    pub name: String,
}

/// A row from one of the status/category registries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStatus {
    pub id: i64,
    pub team: i64,
    pub title: String,
    pub color: String,
    pub is_default: bool,
    pub ordering: i64,
    pub state: State,
}

/// A tag attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbTag {
    pub tag_id: i64,
    pub tag: String,
}

/// A directed link from an entity to an item or experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbLink {
    pub link_type: LinkKind,
    pub link_id: i64,
    pub title: String,
    pub elabid: String,
}

/// An ordered procedural step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStep {
    pub id: i64,
    pub ordering: i64,
    pub body: String,
    pub finished: bool,
    pub finished_time: Option<String>,
    pub deadline: Option<String>,
}

/// File attachment record. The bytes live in external storage under
/// `long_name`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbUpload {
    pub id: i64,
    pub real_name: String,
    pub long_name: String,
    pub hash: Option<String>,
    pub filesize: Option<i64>,
    pub comment: Option<String>,
    pub userid: i64,
    pub created_at: String,
}

/// Advisory exclusive edit lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbEditLease {
    pub locked_by: i64,
    pub locked_by_name: String,
    pub locked_at: String,
    pub expires_at: String,
}

/// A pinned entity in a user's quick-access list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbPin {
    pub entity_type: EntityType,
    pub entity_id: i64,
}
