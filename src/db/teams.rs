use super::*;

use rusqlite::OptionalExtension;

use crate::actor::Actor;
use crate::permissions::Permission;

/// Columns a team admin may change.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamConfigPatch {
    pub force_exp_tpl: Option<bool>,
    pub do_force_canread: Option<bool>,
    pub force_canread: Option<Permission>,
    pub do_force_canwrite: Option<bool>,
    pub force_canwrite: Option<Permission>,
    pub common_template: Option<String>,
    pub common_template_md: Option<String>,
}

impl LabDb {
    // =========================================================================
    // Teams
    // =========================================================================

    fn map_team_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbTeam> {
        let force_canread: String = row.get(4)?;
        let force_canwrite: String = row.get(6)?;
        Ok(DbTeam {
            id: row.get(0)?,
            name: row.get(1)?,
            force_exp_tpl: row.get::<_, i64>(2)? != 0,
            do_force_canread: row.get::<_, i64>(3)? != 0,
            force_canread: Permission::from_json_lossy(&force_canread),
            do_force_canwrite: row.get::<_, i64>(5)? != 0,
            force_canwrite: Permission::from_json_lossy(&force_canwrite),
            common_template: row.get(7)?,
            common_template_md: row.get(8)?,
        })
    }

    pub fn insert_team(&self, name: &str) -> Result<i64, DbError> {
        self.conn
            .execute("INSERT INTO teams (name) VALUES (?1)", params![name])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_team(&self, id: i64) -> Result<Option<DbTeam>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, force_exp_tpl, do_force_canread, force_canread,
                    do_force_canwrite, force_canwrite, common_template, common_template_md
             FROM teams WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::map_team_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn update_team_config(&self, id: i64, patch: &TeamConfigPatch) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE teams SET
                force_exp_tpl = COALESCE(?2, force_exp_tpl),
                do_force_canread = COALESCE(?3, do_force_canread),
                force_canread = COALESCE(?4, force_canread),
                do_force_canwrite = COALESCE(?5, do_force_canwrite),
                force_canwrite = COALESCE(?6, force_canwrite),
                common_template = COALESCE(?7, common_template),
                common_template_md = COALESCE(?8, common_template_md)
             WHERE id = ?1",
            params![
                id,
                patch.force_exp_tpl.map(i64::from),
                patch.do_force_canread.map(i64::from),
                patch.force_canread.map(|p| p.to_json()),
                patch.do_force_canwrite.map(i64::from),
                patch.force_canwrite.map(|p| p.to_json()),
                patch.common_template,
                patch.common_template_md,
            ],
        )?;
        Ok(())
    }

    // =========================================================================
    // Users and membership
    // =========================================================================

    pub fn insert_user(&self, firstname: &str, lastname: &str, email: &str) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO users (firstname, lastname, email) VALUES (?1, ?2, ?3)",
            params![firstname, lastname, email.trim().to_lowercase()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_user(&self, id: i64) -> Result<Option<DbUser>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, firstname, lastname, email, use_markdown, default_read,
                    default_write, is_sysadmin
             FROM users WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], |row| {
            let default_read: Option<String> = row.get(5)?;
            let default_write: Option<String> = row.get(6)?;
            Ok(DbUser {
                id: row.get(0)?,
                firstname: row.get(1)?,
                lastname: row.get(2)?,
                email: row.get(3)?,
                use_markdown: row.get::<_, i64>(4)? != 0,
                default_read: default_read.as_deref().map(Permission::from_json_lossy),
                default_write: default_write.as_deref().map(Permission::from_json_lossy),
                is_sysadmin: row.get::<_, i64>(7)? != 0,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Update a user's editor and default-permission preferences.
    pub fn update_user_preferences(
        &self,
        id: i64,
        use_markdown: bool,
        default_read: Option<Permission>,
        default_write: Option<Permission>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE users SET use_markdown = ?2, default_read = ?3, default_write = ?4
             WHERE id = ?1",
            params![
                id,
                use_markdown as i64,
                default_read.map(|p| p.to_json()),
                default_write.map(|p| p.to_json()),
            ],
        )?;
        Ok(())
    }

    pub fn set_sysadmin(&self, id: i64, is_sysadmin: bool) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE users SET is_sysadmin = ?2 WHERE id = ?1",
            params![id, is_sysadmin as i64],
        )?;
        Ok(())
    }

    pub fn add_user_to_team(&self, user: i64, team: i64, is_admin: bool) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO users2teams (users_id, teams_id, is_admin) VALUES (?1, ?2, ?3)
             ON CONFLICT(users_id, teams_id) DO UPDATE SET is_admin = excluded.is_admin",
            params![user, team, is_admin as i64],
        )?;
        Ok(())
    }

    /// Display name, used in lease notices.
    pub fn user_fullname(&self, id: i64) -> Result<String, DbError> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT firstname || ' ' || lastname FROM users WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name.unwrap_or_else(|| format!("user #{id}")))
    }

    // =========================================================================
    // Team groups
    // =========================================================================

    pub fn insert_team_group(&self, team: i64, name: &str) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO team_groups (team, name) VALUES (?1, ?2)",
            params![team, name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_team_groups(&self, team: i64) -> Result<Vec<DbTeamGroup>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, team, name FROM team_groups WHERE team = ?1 ORDER BY name")?;
        let rows = stmt.query_map(params![team], |row| {
            Ok(DbTeamGroup {
                id: row.get(0)?,
                team: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn add_user_to_group(&self, user: i64, group: i64) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO users2team_groups (userid, groupid) VALUES (?1, ?2)",
            params![user, group],
        )?;
        Ok(())
    }

    // =========================================================================
    // Actor context
    // =========================================================================

    /// Build the explicit context for `user` acting in `team`.
    ///
    /// Returns `Ok(None)` when the user does not exist or is not a member of
    /// the team.
    pub fn load_actor(&self, user: i64, team: i64) -> Result<Option<Actor>, DbError> {
        let Some(db_user) = self.get_user(user)? else {
            return Ok(None);
        };

        let memberships: Vec<(i64, bool)> = {
            let mut stmt = self
                .conn
                .prepare("SELECT teams_id, is_admin FROM users2teams WHERE users_id = ?1")?;
            let rows = stmt.query_map(params![user], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? != 0))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        if !memberships.iter().any(|(t, _)| *t == team) {
            return Ok(None);
        }

        let groups: Vec<i64> = {
            let mut stmt = self
                .conn
                .prepare("SELECT groupid FROM users2team_groups WHERE userid = ?1")?;
            let rows = stmt.query_map(params![user], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        Ok(Some(Actor {
            user_id: Some(db_user.id),
            team_id: team,
            memberships,
            groups,
            is_sysadmin: db_user.is_sysadmin,
            use_markdown: db_user.use_markdown,
            default_read: db_user.default_read,
            default_write: db_user.default_write,
            bypass_read: false,
            bypass_write: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{test_db, Fixture};
    use super::*;

    #[test]
    fn test_team_defaults() {
        let db = test_db();
        let id = db.insert_team("Lab").unwrap();
        let team = db.get_team(id).unwrap().unwrap();
        assert!(!team.force_exp_tpl);
        assert!(!team.do_force_canread);
        assert_eq!(team.force_canread, Permission::Team);
        assert_eq!(team.force_canwrite, Permission::User);
        assert!(team.common_template.is_none());
    }

    #[test]
    fn test_update_team_config_is_partial() {
        let db = test_db();
        let id = db.insert_team("Lab").unwrap();
        db.update_team_config(
            id,
            &TeamConfigPatch {
                force_exp_tpl: Some(true),
                common_template: Some("<h1>Goal</h1>".into()),
                ..Default::default()
            },
        )
        .unwrap();
        db.update_team_config(
            id,
            &TeamConfigPatch {
                do_force_canread: Some(true),
                force_canread: Some(Permission::OwnerOnly),
                ..Default::default()
            },
        )
        .unwrap();
        let team = db.get_team(id).unwrap().unwrap();
        assert!(team.force_exp_tpl);
        assert_eq!(team.common_template.as_deref(), Some("<h1>Goal</h1>"));
        assert_eq!(
            team.enforce_permissions(Permission::Public, Permission::Team),
            (Permission::OwnerOnly, Permission::Team)
        );
    }

    #[test]
    fn test_load_actor_requires_membership() {
        let fx = Fixture::new();
        assert!(fx.db.load_actor(fx.outsider, fx.team).unwrap().is_none());
        assert!(fx.db.load_actor(9999, fx.team).unwrap().is_none());

        let admin = fx.db.load_actor(fx.admin, fx.team).unwrap().unwrap();
        assert!(admin.is_admin());
        let member = fx.db.load_actor(fx.member, fx.team).unwrap().unwrap();
        assert!(!member.is_admin());
        assert_eq!(member.user_id, Some(fx.member));
    }

    #[test]
    fn test_actor_carries_groups_and_preferences() {
        let fx = Fixture::new();
        let group = fx.db.insert_team_group(fx.team, "Imaging").unwrap();
        fx.db.add_user_to_group(fx.member, group).unwrap();
        fx.db
            .update_user_preferences(fx.member, true, Some(Permission::OwnerOnly), None)
            .unwrap();
        let actor = fx.db.load_actor(fx.member, fx.team).unwrap().unwrap();
        assert_eq!(actor.groups, vec![group]);
        assert!(actor.use_markdown);
        assert_eq!(actor.default_read(), Permission::OwnerOnly);
        assert_eq!(actor.default_write(), Permission::User);
    }

    #[test]
    fn test_user_fullname_falls_back() {
        let fx = Fixture::new();
        assert_eq!(fx.db.user_fullname(fx.admin).unwrap(), "Ada Admin");
        assert_eq!(fx.db.user_fullname(4242).unwrap(), "user #4242");
    }
}
