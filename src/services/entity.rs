//! Behaviour shared by every entity kind.
//!
//! Concrete services implement `ConcreteEntity` and get reads, updates,
//! lifecycle transitions, child management, pins and the exclusive edit
//! lease from the provided methods. Kinds that support duplication
//! override `duplicate` and delegate to `duplicate_entity`.

use chrono::Utc;
use serde::Serialize;

use super::{custom_id_conflict, ServiceContext};
use crate::db::uploads::NewUpload;
use crate::db::{
    DbEditLease, DbError, DbLink, DbStep, DbTag, DbUpload, EntityPatch, EntityRecord, NewEntity,
};
use crate::entity::{EntityType, LinkKind, State};
use crate::error::EntityError;
use crate::metadata;
use crate::permissions::{can_perform, Action};
use crate::util::{filter_tag, filter_title, today, DUPLICATE_MARKER};

/// An entity with its child collections, as returned by `read_one`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityView {
    #[serde(flatten)]
    pub entity: EntityRecord,
    pub tags: Vec<DbTag>,
    pub steps: Vec<DbStep>,
    pub items_links: Vec<DbLink>,
    pub experiments_links: Vec<DbLink>,
    pub uploads: Vec<DbUpload>,
    pub exclusive_edit: Option<DbEditLease>,
}

pub trait ConcreteEntity {
    const KIND: EntityType;

    fn ctx(&self) -> ServiceContext<'_>;

    // -------------------------------------------------------------------------
    // Loading and permission gates
    // -------------------------------------------------------------------------

    /// Row of this kind in any state.
    fn fetch_any(&self, id: i64) -> Result<EntityRecord, EntityError> {
        self.ctx()
            .db
            .get_entity(Self::KIND, id)?
            .ok_or(EntityError::NotFound)
    }

    /// Row of this kind that has not been deleted.
    fn fetch(&self, id: i64) -> Result<EntityRecord, EntityError> {
        let record = self.fetch_any(id)?;
        if record.state == State::Deleted {
            return Err(EntityError::NotFound);
        }
        Ok(record)
    }

    fn can_or_explode(&self, record: &EntityRecord, action: Action) -> Result<(), EntityError> {
        let ctx = self.ctx();
        if can_perform(&record.access_target(), ctx.actor, action) {
            return Ok(());
        }
        log::warn!(
            "User {:?} denied {} on {} {}",
            ctx.actor.user_id,
            action.as_str(),
            Self::KIND.as_str(),
            record.id
        );
        Err(EntityError::PermissionDenied(action.as_str()))
    }

    fn ensure_readable(&self, record: &EntityRecord) -> Result<(), EntityError> {
        self.can_or_explode(record, Action::Read)
    }

    fn ensure_writable(&self, record: &EntityRecord) -> Result<(), EntityError> {
        self.can_or_explode(record, Action::Write)
    }

    fn fetch_writable(&self, id: i64) -> Result<EntityRecord, EntityError> {
        let record = self.fetch(id)?;
        self.ensure_writable(&record)?;
        Ok(record)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    fn read_one(&self, id: i64) -> Result<EntityView, EntityError> {
        let record = self.fetch(id)?;
        self.ensure_readable(&record)?;
        self.assemble_view(record)
    }

    /// Attach child collections and the live edit lease to a record.
    fn assemble_view(&self, entity: EntityRecord) -> Result<EntityView, EntityError> {
        let db = self.ctx().db;
        let (kind, id) = (Self::KIND, entity.id);
        Ok(EntityView {
            tags: db.get_entity_tags(kind, id)?,
            steps: db.get_entity_steps(kind, id)?,
            items_links: db.get_entity_links(kind, id, LinkKind::Items)?,
            experiments_links: db.get_entity_links(kind, id, LinkKind::Experiments)?,
            uploads: db.get_entity_uploads(kind, id)?,
            exclusive_edit: db.get_active_edit_lease(kind, id, Utc::now())?,
            entity,
        })
    }

    /// Readable rows in normal state, newest first.
    fn read_all(&self) -> Result<Vec<EntityRecord>, EntityError> {
        let ctx = self.ctx();
        let rows =
            ctx.db
                .get_entities_visible_from_team(Self::KIND, ctx.actor.team_id, State::Normal)?;
        Ok(rows
            .into_iter()
            .filter(|row| can_perform(&row.access_target(), ctx.actor, Action::Read))
            .collect())
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    fn update(&self, id: i64, mut patch: EntityPatch) -> Result<EntityRecord, EntityError> {
        self.fetch_writable(id)?;
        if let Some(title) = patch.title.take() {
            patch.title = Some(filter_title(&title));
        }
        if let Some(raw) = patch.metadata.as_deref() {
            metadata::validate(raw).map_err(EntityError::ImproperAction)?;
        }
        if patch.is_empty() {
            return self.fetch(id);
        }
        self.ctx()
            .db
            .update_entity(Self::KIND, id, &patch)
            .map_err(custom_id_conflict)?;
        self.fetch(id)
    }

    /// Soft-delete, then drop every pin on the entity.
    ///
    /// The state change is committed on its own. A failed pin cleanup is
    /// reported but does not undo the deletion.
    fn destroy(&self, id: i64) -> Result<(), EntityError> {
        let db = self.ctx().db;
        self.fetch_writable(id)?;
        db.set_entity_state(Self::KIND, id, State::Deleted)?;
        log::info!("Deleted {} {}", Self::KIND.as_str(), id);
        if let Err(e) = db.cleanup_pins_for_entity(Self::KIND, id) {
            log::warn!(
                "{} {} is deleted but its pins could not be removed: {}",
                Self::KIND.as_str(),
                id,
                e
            );
            return Err(e.into());
        }
        Ok(())
    }

    fn archive(&self, id: i64) -> Result<(), EntityError> {
        let record = self.fetch_writable(id)?;
        if !record.state.can_transition_to(State::Archived) {
            return Err(EntityError::improper("Only entities in normal state can be archived"));
        }
        self.ctx()
            .db
            .set_entity_state(Self::KIND, id, State::Archived)?;
        log::info!("Archived {} {}", Self::KIND.as_str(), id);
        Ok(())
    }

    /// Bring an archived or deleted entity back to normal state.
    fn restore(&self, id: i64) -> Result<(), EntityError> {
        let record = self.fetch_any(id)?;
        self.ensure_writable(&record)?;
        if record.state == State::Normal {
            return Err(EntityError::improper("This entity is not archived or deleted"));
        }
        self.ctx()
            .db
            .set_entity_state(Self::KIND, id, State::Normal)?;
        log::info!("Restored {} {}", Self::KIND.as_str(), id);
        Ok(())
    }

    fn duplicate(&self, _id: i64, _copy_files: bool) -> Result<i64, EntityError> {
        Err(EntityError::improper("This entity cannot be duplicated"))
    }

    // -------------------------------------------------------------------------
    // Child records
    // -------------------------------------------------------------------------

    fn add_tag(&self, id: i64, tag: &str) -> Result<i64, EntityError> {
        let record = self.fetch_writable(id)?;
        let tag = filter_tag(tag).ok_or_else(|| EntityError::improper("Tag cannot be empty"))?;
        Ok(self
            .ctx()
            .db
            .add_tag_to_entity(record.team, Self::KIND, id, &tag)?)
    }

    fn remove_tag(&self, id: i64, tag_id: i64) -> Result<(), EntityError> {
        self.fetch_writable(id)?;
        self.ctx()
            .db
            .remove_tag_from_entity(Self::KIND, id, tag_id)?;
        Ok(())
    }

    fn add_step(&self, id: i64, body: &str) -> Result<i64, EntityError> {
        self.fetch_writable(id)?;
        let body = body.trim();
        if body.is_empty() {
            return Err(EntityError::improper("Step cannot be empty"));
        }
        Ok(self.ctx().db.add_step(Self::KIND, id, body)?)
    }

    fn toggle_step(&self, id: i64, step_id: i64) -> Result<DbStep, EntityError> {
        self.fetch_writable(id)?;
        self.ctx()
            .db
            .toggle_step(Self::KIND, id, step_id)?
            .ok_or(EntityError::NotFound)
    }

    /// Link to an item or experiment the actor can read.
    fn add_link(&self, id: i64, link_kind: LinkKind, link_id: i64) -> Result<(), EntityError> {
        self.fetch_writable(id)?;
        let ctx = self.ctx();
        let target = ctx
            .db
            .get_entity(link_kind.target_type(), link_id)?
            .filter(|t| t.state != State::Deleted)
            .ok_or(EntityError::NotFound)?;
        if !can_perform(&target.access_target(), ctx.actor, Action::Read) {
            return Err(EntityError::PermissionDenied(Action::Read.as_str()));
        }
        ctx.db.add_link(Self::KIND, id, link_kind, link_id)?;
        Ok(())
    }

    fn remove_link(&self, id: i64, link_kind: LinkKind, link_id: i64) -> Result<(), EntityError> {
        self.fetch_writable(id)?;
        self.ctx()
            .db
            .remove_link(Self::KIND, id, link_kind, link_id)?;
        Ok(())
    }

    /// Record a file already placed in storage.
    fn add_upload_record(&self, id: i64, upload: &NewUpload) -> Result<i64, EntityError> {
        self.fetch_writable(id)?;
        let ctx = self.ctx();
        let user = ctx.user_id()?;
        Ok(ctx.db.add_upload_record(Self::KIND, id, user, upload)?)
    }

    // -------------------------------------------------------------------------
    // Pins
    // -------------------------------------------------------------------------

    fn pin(&self, id: i64) -> Result<(), EntityError> {
        let record = self.fetch(id)?;
        self.ensure_readable(&record)?;
        let ctx = self.ctx();
        ctx.db.pin_entity(ctx.user_id()?, Self::KIND, id)?;
        Ok(())
    }

    fn unpin(&self, id: i64) -> Result<(), EntityError> {
        let ctx = self.ctx();
        ctx.db.unpin_entity(ctx.user_id()?, Self::KIND, id)?;
        Ok(())
    }

    /// Pinned entities of this kind the actor can still read.
    fn list_pinned(&self) -> Result<Vec<EntityRecord>, EntityError> {
        let ctx = self.ctx();
        let pins = ctx.db.get_pins_for_user(ctx.user_id()?, Some(Self::KIND))?;
        let mut records = Vec::with_capacity(pins.len());
        for pin in pins {
            match self.fetch(pin.entity_id) {
                Ok(record) => {
                    if self.ensure_readable(&record).is_ok() {
                        records.push(record);
                    }
                }
                Err(EntityError::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    // -------------------------------------------------------------------------
    // Exclusive edit lease
    // -------------------------------------------------------------------------

    /// Take the advisory edit lease, or renew it when the actor holds it.
    fn acquire_exclusive_edit(&self, id: i64) -> Result<DbEditLease, EntityError> {
        self.fetch_writable(id)?;
        let ctx = self.ctx();
        let user = ctx.user_id()?;
        let now = Utc::now();
        if let Some(lease) = ctx.db.get_active_edit_lease(Self::KIND, id, now)? {
            if lease.locked_by != user {
                return Err(EntityError::ImproperAction(format!(
                    "This entity is being edited by {} until {}",
                    lease.locked_by_name, lease.expires_at
                )));
            }
        }
        ctx.db
            .acquire_edit_lease(Self::KIND, id, user, now, ctx.lease_minutes)
            .map_err(|e| match e {
                DbError::LeaseOutOfRange(minutes) => EntityError::ImproperAction(format!(
                    "Exclusive edit mode cannot last {} minutes",
                    minutes
                )),
                other => other.into(),
            })?;
        ctx.db
            .get_active_edit_lease(Self::KIND, id, now)?
            .ok_or(EntityError::NotFound)
    }

    /// Drop the lease. Only its holder or a team admin may do so.
    fn release_exclusive_edit(&self, id: i64) -> Result<(), EntityError> {
        let record = self.fetch(id)?;
        let ctx = self.ctx();
        if let Some(lease) = ctx.db.get_active_edit_lease(Self::KIND, id, Utc::now())? {
            let holder = ctx.actor.user_id == Some(lease.locked_by);
            if !holder && !ctx.actor.is_admin_of(record.team) {
                return Err(EntityError::illegal(
                    "Only the lease holder or an admin can release exclusive edit mode",
                ));
            }
        }
        ctx.db.release_edit_lease(Self::KIND, id)?;
        Ok(())
    }
}

/// Copy an entity into a new row owned by the actor, in one transaction.
///
/// The copy gets the duplicate marker appended to its title, today's date,
/// the team's default status, a fresh elabid and the next custom id of its
/// category. Links, steps and tags are copied; upload records only when
/// `copy_files` is set. With `backlink` the copy also links to its source.
pub(crate) fn duplicate_entity<S: ConcreteEntity>(
    service: &S,
    id: i64,
    copy_files: bool,
    backlink: bool,
) -> Result<i64, EntityError> {
    let ctx = service.ctx();
    let source = service.fetch(id)?;
    service.can_or_explode(&source, Action::Read)?;
    let user = ctx.user_id()?;
    let team = ctx.actor.team_id;
    let kind = S::KIND;

    let new_id = ctx.db.with_transaction(|db| {
        let entity = NewEntity {
            team,
            userid: user,
            title: format!("{}{}", source.title, DUPLICATE_MARKER),
            body: source.body.clone(),
            content_type: source.content_type,
            category: source.category,
            status: db.get_registry_default(kind.status_registry(), team)?,
            date: today().format("%Y-%m-%d").to_string(),
            elabid: ctx.elabids.generate(),
            custom_id: db.next_custom_id(kind, team, source.category)?,
            canread: source.canread,
            canwrite: source.canwrite,
            canread_target: source.canread_target,
            canwrite_target: source.canwrite_target,
            metadata: metadata::blank_extra_fields_on_duplicate(source.metadata.as_deref()),
            color: source.color.clone(),
        };
        let new_id = db.insert_entity(kind, &entity)?;
        let (from, to) = ((kind, id), (kind, new_id));
        db.duplicate_links(from, to)?;
        db.duplicate_steps(from, to)?;
        db.copy_tags(from, to)?;
        if backlink {
            db.add_link(kind, new_id, LinkKind::Experiments, id)?;
        }
        if copy_files {
            db.duplicate_uploads(from, to, user)?;
        }
        Ok::<i64, EntityError>(new_id)
    })?;

    log::info!("Duplicated {} {} into {}", kind.as_str(), id, new_id);
    Ok(new_id)
}
