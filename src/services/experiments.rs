use super::entity::{duplicate_entity, ConcreteEntity};
use super::templates::Templates;
use super::ServiceContext;
use crate::db::NewEntity;
use crate::entity::{ContentType, EntityType, TemplateRef};
use crate::error::EntityError;
use crate::permissions::Permission;
use crate::util::{filter_tag, today, UNTITLED};

pub struct Experiments<'a> {
    ctx: ServiceContext<'a>,
}

impl<'a> Experiments<'a> {
    pub fn new(ctx: ServiceContext<'a>) -> Self {
        Self { ctx }
    }

    /// Create an experiment from a template, the team's common template, or
    /// nothing. Returns the new id.
    ///
    /// Teams that force template use reject the common and blank variants
    /// before anything is written. Custom id allocation, the insert and the
    /// copy of the template's child records share one transaction.
    pub fn create(&self, template: TemplateRef, tags: &[String]) -> Result<i64, EntityError> {
        let ctx = self.ctx;
        let user = ctx.user_id()?;
        let team = ctx.team()?;
        let kind = EntityType::Experiment;

        let mut entity = NewEntity {
            team: team.id,
            userid: user,
            title: UNTITLED.to_string(),
            body: None,
            content_type: ContentType::preferred(ctx.actor.use_markdown),
            category: None,
            status: ctx.db.get_registry_default(kind.status_registry(), team.id)?,
            date: today().format("%Y-%m-%d").to_string(),
            elabid: String::new(),
            custom_id: None,
            canread: Permission::DEFAULT_READ,
            canwrite: Permission::DEFAULT_WRITE,
            canread_target: Permission::DEFAULT_READ,
            canwrite_target: Permission::DEFAULT_WRITE,
            metadata: None,
            color: None,
        };

        match template {
            TemplateRef::Id(template_id) => {
                let templates = Templates::new(ctx);
                let tpl = templates.fetch(template_id)?;
                templates.ensure_readable(&tpl)?;
                entity.title = tpl.title;
                entity.category = tpl.category;
                entity.status = tpl.status.or(entity.status);
                entity.body = tpl.body;
                entity.canread = tpl.canread_target;
                entity.canwrite = tpl.canwrite_target;
                entity.metadata = tpl.metadata;
                entity.content_type = tpl.content_type;
            }
            TemplateRef::Common | TemplateRef::Blank => {
                if team.force_exp_tpl {
                    return Err(EntityError::improper("Experiments must use a template!"));
                }
                entity.canread = ctx.actor.default_read();
                entity.canwrite = ctx.actor.default_write();
                if template == TemplateRef::Common {
                    entity.body = team.common_body(ctx.actor.use_markdown);
                }
            }
        }

        let (canread, canwrite) = team.enforce_permissions(entity.canread, entity.canwrite);
        entity.canread = canread;
        entity.canwrite = canwrite;

        let id = ctx.db.with_transaction(|db| {
            entity.custom_id = db.next_custom_id(kind, team.id, entity.category)?;
            entity.elabid = ctx.elabids.generate();
            let id = db.insert_entity(kind, &entity)?;

            if let TemplateRef::Id(template_id) = template {
                let (from, to) = ((EntityType::Template, template_id), (kind, id));
                db.copy_tags(from, to)?;
                db.duplicate_steps(from, to)?;
                db.duplicate_links(from, to)?;
                db.duplicate_uploads(from, to, user)?;
            }
            for tag in tags.iter().filter_map(|t| filter_tag(t)) {
                db.add_tag_to_entity(team.id, kind, id, &tag)?;
            }
            Ok::<i64, EntityError>(id)
        })?;

        log::info!("Created experiment {} ({:?}) in team {}", id, template, team.id);
        Ok(id)
    }
}

impl ConcreteEntity for Experiments<'_> {
    const KIND: EntityType = EntityType::Experiment;

    fn ctx(&self) -> ServiceContext<'_> {
        self.ctx
    }

    /// Copies also link back to the experiment they came from.
    fn duplicate(&self, id: i64, copy_files: bool) -> Result<i64, EntityError> {
        duplicate_entity(self, id, copy_files, true)
    }
}
