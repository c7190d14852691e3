use crate::actor::Actor;
use crate::db::teams::TeamConfigPatch;
use crate::db::{DbTeam, DbTeamGroup, LabDb};
use crate::entity::Registry;
use crate::error::EntityError;

/// Statuses every new team starts with. The first one is the default.
const DEFAULT_EXPERIMENT_STATUSES: [(&str, &str); 4] = [
    ("Running", "29aeb9"),
    ("Success", "54aa08"),
    ("Need to be redone", "c0c0c0"),
    ("Fail", "c24f3d"),
];

pub struct TeamsService<'a> {
    db: &'a LabDb,
    actor: &'a Actor,
}

impl<'a> TeamsService<'a> {
    pub fn new(db: &'a LabDb, actor: &'a Actor) -> Self {
        Self { db, actor }
    }

    fn sysadmin_or_explode(&self, what: &str) -> Result<(), EntityError> {
        if self.actor.is_sysadmin {
            return Ok(());
        }
        log::warn!("User {:?} tried to {} without sysadmin rights", self.actor.user_id, what);
        Err(EntityError::illegal(format!("Only a sysadmin can {}", what)))
    }

    fn team_admin_or_explode(&self, team: i64, what: &str) -> Result<(), EntityError> {
        if self.actor.is_sysadmin || self.actor.is_admin_of(team) {
            return Ok(());
        }
        log::warn!(
            "User {:?} tried to {} but is not an admin of team {}",
            self.actor.user_id,
            what,
            team
        );
        Err(EntityError::illegal(format!("User tried to {} but is not Admin", what)))
    }

    /// Create a team with the default experiment statuses.
    pub fn create_team(&self, name: &str) -> Result<i64, EntityError> {
        self.sysadmin_or_explode("create a team")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(EntityError::improper("Team name cannot be empty"));
        }
        let id = self.db.with_transaction(|db| {
            let id = db.insert_team(name).map_err(|e| {
                if e.is_unique_violation() {
                    EntityError::improper(format!("A team named '{}' already exists", name))
                } else {
                    EntityError::Db(e)
                }
            })?;
            for (i, (title, color)) in DEFAULT_EXPERIMENT_STATUSES.iter().enumerate() {
                db.insert_registry_entry(Registry::ExperimentsStatus, id, title, color, i == 0)?;
            }
            Ok::<i64, EntityError>(id)
        })?;
        log::info!("Created team {} ({})", id, name);
        Ok(id)
    }

    pub fn create_user(&self, firstname: &str, lastname: &str, email: &str) -> Result<i64, EntityError> {
        self.sysadmin_or_explode("create a user")?;
        let email = email.trim();
        if !email.contains('@') {
            return Err(EntityError::ImproperAction(format!("Invalid email '{}'", email)));
        }
        let id = self
            .db
            .insert_user(firstname.trim(), lastname.trim(), email)
            .map_err(|e| {
                if e.is_unique_violation() {
                    EntityError::improper("Someone is already using that email address!")
                } else {
                    EntityError::Db(e)
                }
            })?;
        log::info!("Created user {}", id);
        Ok(id)
    }

    pub fn add_user_to_team(&self, user: i64, team: i64, is_admin: bool) -> Result<(), EntityError> {
        self.team_admin_or_explode(team, "add a user to a team")?;
        self.db.get_user(user)?.ok_or(EntityError::NotFound)?;
        self.db.get_team(team)?.ok_or(EntityError::NotFound)?;
        self.db.add_user_to_team(user, team, is_admin)?;
        log::info!("User {} joined team {} (admin: {})", user, team, is_admin);
        Ok(())
    }

    pub fn create_group(&self, name: &str) -> Result<i64, EntityError> {
        let team = self.actor.team_id;
        self.team_admin_or_explode(team, "create a group")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(EntityError::improper("Group name cannot be empty"));
        }
        Ok(self.db.insert_team_group(team, name)?)
    }

    pub fn read_groups(&self) -> Result<Vec<DbTeamGroup>, EntityError> {
        Ok(self.db.get_team_groups(self.actor.team_id)?)
    }

    /// Put a member of the actor's team into one of its groups.
    pub fn add_user_to_group(&self, user: i64, group: i64) -> Result<(), EntityError> {
        let team = self.actor.team_id;
        self.team_admin_or_explode(team, "edit a group")?;
        if !self.db.get_team_groups(team)?.iter().any(|g| g.id == group) {
            return Err(EntityError::NotFound);
        }
        if self.db.load_actor(user, team)?.is_none() {
            return Err(EntityError::improper("This user is not in the team of the group"));
        }
        self.db.add_user_to_group(user, group)?;
        Ok(())
    }

    pub fn read_config(&self) -> Result<DbTeam, EntityError> {
        let team = self.actor.team_id;
        if !self.actor.is_sysadmin && !self.actor.is_member_of(team) {
            return Err(EntityError::illegal("User is not a member of this team"));
        }
        self.db.get_team(team)?.ok_or(EntityError::NotFound)
    }

    pub fn update_config(&self, patch: &TeamConfigPatch) -> Result<DbTeam, EntityError> {
        let team = self.actor.team_id;
        self.team_admin_or_explode(team, "update the team configuration")?;
        self.db.update_team_config(team, patch)?;
        log::info!("Updated configuration of team {}", team);
        self.read_config()
    }
}
