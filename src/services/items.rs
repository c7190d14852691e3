use super::entity::{duplicate_entity, ConcreteEntity};
use super::items_types::ItemsTypes;
use super::ServiceContext;
use crate::db::NewEntity;
use crate::entity::EntityType;
use crate::error::EntityError;
use crate::util::{filter_tag, today, UNTITLED};

/// Resources of the team database (antibodies, plasmids, instruments...).
pub struct Items<'a> {
    ctx: ServiceContext<'a>,
}

impl<'a> Items<'a> {
    pub fn new(ctx: ServiceContext<'a>) -> Self {
        Self { ctx }
    }

    /// Create an item of the given type. The type acts as the template: its
    /// body, target permissions, metadata and child records are copied, and
    /// it becomes the item's category. The title stays "Untitled".
    pub fn create(&self, item_type: i64, tags: &[String]) -> Result<i64, EntityError> {
        let ctx = self.ctx;
        let user = ctx.user_id()?;
        let team = ctx.team()?;
        let kind = EntityType::Item;

        let category = ItemsTypes::new(ctx).fetch_in_team(item_type)?;
        let (canread, canwrite) =
            team.enforce_permissions(category.canread_target, category.canwrite_target);

        let id = ctx.db.with_transaction(|db| {
            let entity = NewEntity {
                team: team.id,
                userid: user,
                title: UNTITLED.to_string(),
                body: category.body.clone(),
                content_type: category.content_type,
                category: Some(category.id),
                status: db.get_registry_default(kind.status_registry(), team.id)?,
                date: today().format("%Y-%m-%d").to_string(),
                elabid: ctx.elabids.generate(),
                custom_id: db.next_custom_id(kind, team.id, Some(category.id))?,
                canread,
                canwrite,
                canread_target: category.canread_target,
                canwrite_target: category.canwrite_target,
                metadata: category.metadata.clone(),
                color: None,
            };
            let id = db.insert_entity(kind, &entity)?;

            let (from, to) = ((EntityType::ItemType, category.id), (kind, id));
            db.copy_tags(from, to)?;
            db.duplicate_steps(from, to)?;
            db.duplicate_links(from, to)?;
            db.duplicate_uploads(from, to, user)?;
            for tag in tags.iter().filter_map(|t| filter_tag(t)) {
                db.add_tag_to_entity(team.id, kind, id, &tag)?;
            }
            Ok::<i64, EntityError>(id)
        })?;

        log::info!("Created item {} of type {} in team {}", id, item_type, team.id);
        Ok(id)
    }
}

impl ConcreteEntity for Items<'_> {
    const KIND: EntityType = EntityType::Item;

    fn ctx(&self) -> ServiceContext<'_> {
        self.ctx
    }

    fn duplicate(&self, id: i64, copy_files: bool) -> Result<i64, EntityError> {
        duplicate_entity(self, id, copy_files, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::Fixture;
    use crate::db::EntityPatch;
    use crate::entity::{LinkKind, Registry};
    use crate::permissions::Permission;
    use crate::types::Config;

    #[test]
    fn test_create_from_item_type() {
        let fx = Fixture::new();
        let admin = fx.actor(fx.admin);
        let context = ServiceContext::new(&fx.db, &admin, &Config::default());
        let types = ItemsTypes::new(context);
        let antibody = types.create("Antibody").unwrap();
        types
            .update(
                antibody,
                EntityPatch {
                    body: Some("Host: \nDilution: ".into()),
                    canread_target: Some(Permission::Organization),
                    ..Default::default()
                },
            )
            .unwrap();
        types.add_step(antibody, "Check expiry").unwrap();
        let in_stock = fx
            .db
            .insert_registry_entry(Registry::ItemsStatus, fx.team, "In stock", "00aa00", true)
            .unwrap();

        let member = fx.actor(fx.member);
        let items = Items::new(ServiceContext::new(&fx.db, &member, &Config::default()));
        let id = items.create(antibody, &["rabbit".into()]).unwrap();

        let view = items.read_one(id).unwrap();
        assert_eq!(view.entity.title, "Untitled");
        assert_eq!(view.entity.category, Some(antibody));
        assert_eq!(view.entity.status, Some(in_stock));
        assert_eq!(view.entity.body.as_deref(), Some("Host: \nDilution: "));
        assert_eq!(view.entity.canread, Permission::Organization);
        assert_eq!(view.entity.canwrite, Permission::Team);
        assert_eq!(view.entity.userid, fx.member);
        assert_eq!(view.steps.len(), 1);
        assert_eq!(view.tags.len(), 1);
    }

    #[test]
    fn test_create_with_deleted_type_fails() {
        let fx = Fixture::new();
        let admin = fx.actor(fx.admin);
        let context = ServiceContext::new(&fx.db, &admin, &Config::default());
        let types = ItemsTypes::new(context);
        let plasmid = types.create("Plasmid").unwrap();
        types.destroy(plasmid).unwrap();

        let items = Items::new(context);
        assert!(matches!(items.create(plasmid, &[]), Err(EntityError::NotFound)));
        assert_eq!(fx.db.count_team_rows("items", fx.team).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_item_uses_items_status_default() {
        let fx = Fixture::new();
        let admin = fx.actor(fx.admin);
        let context = ServiceContext::new(&fx.db, &admin, &Config::default());
        let plasmid = ItemsTypes::new(context).create("Plasmid").unwrap();
        let ordered = fx
            .db
            .insert_registry_entry(Registry::ItemsStatus, fx.team, "Ordered", "aaaaaa", false)
            .unwrap();
        let stocked = fx
            .db
            .insert_registry_entry(Registry::ItemsStatus, fx.team, "Stocked", "bbbbbb", true)
            .unwrap();

        let items = Items::new(context);
        let id = items.create(plasmid, &[]).unwrap();
        items
            .update(
                id,
                EntityPatch {
                    title: Some("pUC19".into()),
                    status: Some(ordered),
                    ..Default::default()
                },
            )
            .unwrap();
        let linked = items.create(plasmid, &[]).unwrap();
        items.add_link(id, LinkKind::Items, linked).unwrap();

        let copy = items.duplicate(id, false).unwrap();
        let view = items.read_one(copy).unwrap();
        assert_eq!(view.entity.title, "pUC19 I");
        assert_eq!(view.entity.status, Some(stocked));
        assert_eq!(view.entity.category, Some(plasmid));
        assert_eq!(view.items_links.len(), 1);
        assert!(view.experiments_links.is_empty());
    }
}
