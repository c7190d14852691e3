use super::entity::{ConcreteEntity, EntityView};
use super::ServiceContext;
use crate::db::{EntityRecord, NewEntity};
use crate::entity::{ContentType, EntityType, State};
use crate::error::EntityError;
use crate::permissions::Permission;
use crate::util::{filter_title, today};

/// Resource categories. Administered by team admins, readable by anyone
/// who can reach them.
pub struct ItemsTypes<'a> {
    ctx: ServiceContext<'a>,
}

impl<'a> ItemsTypes<'a> {
    pub fn new(ctx: ServiceContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn create(&self, title: &str) -> Result<i64, EntityError> {
        self.ctx.admin_or_explode("create items types")?;
        self.insert(title)
    }

    fn insert(&self, title: &str) -> Result<i64, EntityError> {
        let ctx = self.ctx;
        let entity = NewEntity {
            team: ctx.actor.team_id,
            userid: ctx.user_id()?,
            title: filter_title(title),
            body: None,
            content_type: ContentType::preferred(ctx.actor.use_markdown),
            category: None,
            status: None,
            date: today().format("%Y-%m-%d").to_string(),
            elabid: ctx.elabids.generate(),
            custom_id: None,
            canread: Permission::Team,
            canwrite: Permission::Team,
            canread_target: Permission::Team,
            canwrite_target: Permission::Team,
            metadata: None,
            color: None,
        };
        let id = ctx.db.insert_entity(EntityType::ItemType, &entity)?;
        log::info!("Created items type {} in team {}", id, ctx.actor.team_id);
        Ok(id)
    }

    /// First items type of the team by id. There is no default flag.
    pub fn get_default(&self) -> Result<Option<i64>, EntityError> {
        Ok(self
            .ctx
            .db
            .first_entity_id(EntityType::ItemType, self.ctx.actor.team_id)?)
    }

    /// Id of the team's items type with exactly this title, created when
    /// missing. Lookup and insert share one transaction.
    pub fn get_idempotent_id_from_title(&self, title: &str) -> Result<i64, EntityError> {
        let ctx = self.ctx;
        let title = filter_title(title);
        ctx.db.with_transaction(|db| {
            if let Some(id) =
                db.find_entity_id_by_title(EntityType::ItemType, ctx.actor.team_id, &title)?
            {
                return Ok(id);
            }
            self.create(&title)
        })
    }

    /// Apply `(position, id)` pairs. Ids from other teams are ignored.
    pub fn update_ordering(&self, ordering: &[(i64, i64)]) -> Result<(), EntityError> {
        let ctx = self.ctx;
        ctx.admin_or_explode("reorder items types")?;
        ctx.db.with_transaction(|db| {
            for (position, id) in ordering {
                db.update_entity_ordering(EntityType::ItemType, ctx.actor.team_id, *id, *position)?;
            }
            Ok::<(), EntityError>(())
        })
    }

    /// Row of the actor's team, ignoring deleted ones.
    pub(crate) fn fetch_in_team(&self, id: i64) -> Result<EntityRecord, EntityError> {
        let record = self.fetch(id)?;
        if record.team != self.ctx.actor.team_id {
            return Err(EntityError::NotFound);
        }
        Ok(record)
    }
}

impl ConcreteEntity for ItemsTypes<'_> {
    const KIND: EntityType = EntityType::ItemType;

    fn ctx(&self) -> ServiceContext<'_> {
        self.ctx
    }

    fn ensure_readable(&self, _record: &EntityRecord) -> Result<(), EntityError> {
        Ok(())
    }

    fn ensure_writable(&self, record: &EntityRecord) -> Result<(), EntityError> {
        if record.team != self.ctx.actor.team_id {
            return Err(EntityError::NotFound);
        }
        self.ctx.admin_or_explode("edit items types")
    }

    /// No read check: categories are shown wherever items are.
    fn read_one(&self, id: i64) -> Result<EntityView, EntityError> {
        let record = self.fetch_in_team(id)?;
        self.assemble_view(record)
    }

    /// Normal rows of the team by ordering.
    fn read_all(&self) -> Result<Vec<EntityRecord>, EntityError> {
        Ok(self
            .ctx
            .db
            .get_entities_by_ordering(EntityType::ItemType, self.ctx.actor.team_id)?
            .into_iter()
            .filter(|row| row.state == State::Normal)
            .collect())
    }

    fn duplicate(&self, _id: i64, _copy_files: bool) -> Result<i64, EntityError> {
        Err(EntityError::improper(
            "No duplicate action for resources categories.",
        ))
    }
}
