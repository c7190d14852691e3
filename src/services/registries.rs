use super::ServiceContext;
use crate::db::DbStatus;
use crate::entity::{Registry, State};
use crate::error::EntityError;
use crate::util::filter_title;

/// Status and category lists of the actor's team.
pub struct Registries<'a> {
    ctx: ServiceContext<'a>,
    registry: Registry,
}

impl<'a> Registries<'a> {
    pub fn new(ctx: ServiceContext<'a>, registry: Registry) -> Self {
        Self { ctx, registry }
    }

    pub fn create(&self, title: &str, color: &str, is_default: bool) -> Result<i64, EntityError> {
        let ctx = self.ctx;
        ctx.admin_or_explode("create a status or category")?;
        let color = normalize_color(color)?;
        let id = ctx.db.insert_registry_entry(
            self.registry,
            ctx.actor.team_id,
            &filter_title(title),
            &color,
            is_default,
        )?;
        log::info!(
            "Created {} entry {} in team {}",
            self.registry.table(),
            id,
            ctx.actor.team_id
        );
        Ok(id)
    }

    pub fn read_all(&self) -> Result<Vec<DbStatus>, EntityError> {
        Ok(self
            .ctx
            .db
            .get_registry_entries(self.registry, self.ctx.actor.team_id)?)
    }

    pub fn get_default(&self) -> Result<Option<i64>, EntityError> {
        Ok(self
            .ctx
            .db
            .get_registry_default(self.registry, self.ctx.actor.team_id)?)
    }

    pub fn set_default(&self, id: i64) -> Result<(), EntityError> {
        self.ctx.admin_or_explode("change the default status")?;
        self.fetch_in_team(id)?;
        self.ctx
            .db
            .set_registry_default(self.registry, self.ctx.actor.team_id, id)?;
        Ok(())
    }

    /// Apply `(position, id)` pairs. Ids from other teams are ignored.
    pub fn update_ordering(&self, ordering: &[(i64, i64)]) -> Result<(), EntityError> {
        let ctx = self.ctx;
        ctx.admin_or_explode("reorder statuses or categories")?;
        ctx.db.with_transaction(|db| {
            for (position, id) in ordering {
                db.update_registry_ordering(self.registry, ctx.actor.team_id, *id, *position)?;
            }
            Ok::<(), EntityError>(())
        })
    }

    /// Soft-delete an entry. Entities keep pointing at it.
    pub fn destroy(&self, id: i64) -> Result<(), EntityError> {
        let ctx = self.ctx;
        ctx.admin_or_explode("delete a status or category")?;
        self.fetch_in_team(id)?;
        ctx.db
            .set_registry_state(self.registry, ctx.actor.team_id, id, State::Deleted)?;
        log::info!("Deleted {} entry {}", self.registry.table(), id);
        Ok(())
    }

    fn fetch_in_team(&self, id: i64) -> Result<DbStatus, EntityError> {
        self.ctx
            .db
            .get_registry_entry(self.registry, id)?
            .filter(|e| e.team == self.ctx.actor.team_id && e.state != State::Deleted)
            .ok_or(EntityError::NotFound)
    }
}

/// Six hex digits, with or without a leading `#`. Stored lowercase without
/// the hash.
fn normalize_color(input: &str) -> Result<String, EntityError> {
    let hex = input.trim().trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(hex.to_ascii_lowercase())
    } else {
        Err(EntityError::ImproperAction(format!(
            "Invalid color '{}': expected six hex digits",
            input
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::Fixture;
    use crate::types::Config;

    #[test]
    fn test_create_requires_admin_and_valid_color() {
        let fx = Fixture::new();
        let member = fx.actor(fx.member);
        let as_member = Registries::new(
            ServiceContext::new(&fx.db, &member, &Config::default()),
            Registry::ExperimentsCategories,
        );
        assert!(matches!(
            as_member.create("Cloning", "ff0000", false),
            Err(EntityError::IllegalAction(_))
        ));

        let admin = fx.actor(fx.admin);
        let categories = Registries::new(
            ServiceContext::new(&fx.db, &admin, &Config::default()),
            Registry::ExperimentsCategories,
        );
        assert!(matches!(
            categories.create("Cloning", "red", false),
            Err(EntityError::ImproperAction(_))
        ));
        let id = categories.create("Cloning", "#FF00AA", true).unwrap();
        let entries = categories.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].color, "ff00aa");
        assert_eq!(categories.get_default().unwrap(), Some(id));
    }

    #[test]
    fn test_default_moves_and_ordering_is_admin_only() {
        let fx = Fixture::new();
        let admin = fx.actor(fx.admin);
        let statuses = Registries::new(
            ServiceContext::new(&fx.db, &admin, &Config::default()),
            Registry::ItemsStatus,
        );
        let a = statuses.create("Ordered", "aaaaaa", true).unwrap();
        let b = statuses.create("Received", "bbbbbb", false).unwrap();
        statuses.set_default(b).unwrap();
        assert_eq!(statuses.get_default().unwrap(), Some(b));

        statuses.update_ordering(&[(1, b), (2, a)]).unwrap();
        let member = fx.actor(fx.member);
        let as_member = Registries::new(
            ServiceContext::new(&fx.db, &member, &Config::default()),
            Registry::ItemsStatus,
        );
        assert!(matches!(
            as_member.update_ordering(&[(1, a), (2, b)]),
            Err(EntityError::IllegalAction(_))
        ));
        let titles: Vec<String> = as_member
            .read_all()
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Received", "Ordered"]);
    }

    #[test]
    fn test_destroy_is_scoped_to_team() {
        let fx = Fixture::new();
        let admin = fx.actor(fx.admin);
        let statuses = Registries::new(
            ServiceContext::new(&fx.db, &admin, &Config::default()),
            Registry::ExperimentsStatus,
        );
        let id = statuses.create("Running", "29aeb9", true).unwrap();

        let mut foreign_admin = fx.actor(fx.outsider);
        foreign_admin.memberships = vec![(fx.other_team, true)];
        let foreign = Registries::new(
            ServiceContext::new(&fx.db, &foreign_admin, &Config::default()),
            Registry::ExperimentsStatus,
        );
        assert!(matches!(foreign.destroy(id), Err(EntityError::NotFound)));

        statuses.destroy(id).unwrap();
        assert!(statuses.read_all().unwrap().is_empty());
        assert_eq!(statuses.get_default().unwrap(), None);
    }
}
