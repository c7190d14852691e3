//! Permission-checked operations over the store.
//!
//! Every service borrows a `ServiceContext`: the database handle, the acting
//! user and the few configuration values the operations need.

pub mod entity;
pub mod experiments;
pub mod items;
pub mod items_types;
pub mod registries;
pub mod teams;
pub mod templates;

pub use entity::{ConcreteEntity, EntityView};
pub use experiments::Experiments;
pub use items::Items;
pub use items_types::ItemsTypes;
pub use registries::Registries;
pub use teams::TeamsService;
pub use templates::Templates;

use crate::actor::Actor;
use crate::db::{DbError, DbTeam, LabDb};
use crate::error::EntityError;
use crate::types::Config;
use crate::util::{DatedHashGenerator, ElabidGenerator};

#[derive(Clone, Copy)]
pub struct ServiceContext<'a> {
    pub db: &'a LabDb,
    pub actor: &'a Actor,
    pub lease_minutes: i64,
    pub elabids: &'a dyn ElabidGenerator,
}

impl<'a> ServiceContext<'a> {
    pub fn new(db: &'a LabDb, actor: &'a Actor, config: &Config) -> Self {
        Self {
            db,
            actor,
            lease_minutes: config.exclusive_edit_minutes,
            elabids: &DatedHashGenerator,
        }
    }

    /// Swap the identifier source.
    pub fn with_generator(self, elabids: &'a dyn ElabidGenerator) -> Self {
        Self { elabids, ..self }
    }

    /// The acting user. Anonymous actors cannot create or own anything.
    pub(crate) fn user_id(&self) -> Result<i64, EntityError> {
        self.actor
            .user_id
            .ok_or_else(|| EntityError::illegal("Anonymous users cannot perform this action"))
    }

    /// Configuration of the team the actor works in.
    pub(crate) fn team(&self) -> Result<DbTeam, EntityError> {
        self.db
            .get_team(self.actor.team_id)?
            .ok_or(EntityError::NotFound)
    }

    /// Admin-only gate. Trusted callers with write bypass pass too.
    pub(crate) fn admin_or_explode(&self, what: &str) -> Result<(), EntityError> {
        if self.actor.bypass_write || self.actor.is_admin() {
            return Ok(());
        }
        log::warn!(
            "User {:?} tried to {} but is not an admin of team {}",
            self.actor.user_id,
            what,
            self.actor.team_id
        );
        Err(EntityError::illegal(format!(
            "User tried to {} but is not Admin",
            what
        )))
    }
}

/// Store failures from writes that may collide with the custom id index.
pub(crate) fn custom_id_conflict(err: DbError) -> EntityError {
    if err.is_unique_violation() {
        EntityError::improper("Custom id is already used in this category")
    } else {
        EntityError::Db(err)
    }
}
