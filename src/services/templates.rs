use super::entity::{duplicate_entity, ConcreteEntity};
use super::ServiceContext;
use crate::db::NewEntity;
use crate::entity::{ContentType, EntityType};
use crate::error::EntityError;
use crate::permissions::Permission;
use crate::util::{filter_title, today};

/// Experiment templates.
pub struct Templates<'a> {
    ctx: ServiceContext<'a>,
}

impl<'a> Templates<'a> {
    pub fn new(ctx: ServiceContext<'a>) -> Self {
        Self { ctx }
    }

    /// New template owned by the actor, seeded with the team's common
    /// template body. Experiments created from it get Team/User.
    pub fn create(&self, title: &str) -> Result<i64, EntityError> {
        let ctx = self.ctx;
        let user = ctx.user_id()?;
        let team = ctx.team()?;
        let (canread, canwrite) =
            team.enforce_permissions(ctx.actor.default_read(), ctx.actor.default_write());

        let entity = NewEntity {
            team: team.id,
            userid: user,
            title: filter_title(title),
            body: team.common_body(ctx.actor.use_markdown),
            content_type: ContentType::preferred(ctx.actor.use_markdown),
            category: None,
            status: None,
            date: today().format("%Y-%m-%d").to_string(),
            elabid: ctx.elabids.generate(),
            custom_id: None,
            canread,
            canwrite,
            canread_target: Permission::DEFAULT_READ,
            canwrite_target: Permission::DEFAULT_WRITE,
            metadata: None,
            color: None,
        };
        let id = ctx.db.insert_entity(EntityType::Template, &entity)?;
        log::info!("Created template {} in team {}", id, team.id);
        Ok(id)
    }
}

impl ConcreteEntity for Templates<'_> {
    const KIND: EntityType = EntityType::Template;

    fn ctx(&self) -> ServiceContext<'_> {
        self.ctx
    }

    fn duplicate(&self, id: i64, copy_files: bool) -> Result<i64, EntityError> {
        duplicate_entity(self, id, copy_files, false)
    }
}
