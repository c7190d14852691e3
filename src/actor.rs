//! Explicit request context.
//!
//! Every service call receives the acting user, the team they act in and
//! their preferences. Nothing is read from ambient session state.

use serde::Serialize;

use crate::permissions::Permission;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// `None` for anonymous (public) access.
    pub user_id: Option<i64>,
    /// Team the actor is currently working in.
    pub team_id: i64,
    /// Every team the user belongs to, with the admin flag for each.
    pub memberships: Vec<(i64, bool)>,
    /// Team groups the user belongs to.
    pub groups: Vec<i64>,
    pub is_sysadmin: bool,
    pub use_markdown: bool,
    pub default_read: Option<Permission>,
    pub default_write: Option<Permission>,
    /// Trusted internal callers may skip permission checks.
    pub bypass_read: bool,
    pub bypass_write: bool,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            team_id: 0,
            memberships: Vec::new(),
            groups: Vec::new(),
            is_sysadmin: false,
            use_markdown: false,
            default_read: None,
            default_write: None,
            bypass_read: false,
            bypass_write: false,
        }
    }

    /// Instance-level caller for bootstrap commands (teams, users). Owns
    /// nothing and holds no team membership.
    pub fn system() -> Self {
        Self {
            is_sysadmin: true,
            ..Self::anonymous()
        }
    }

    pub fn is_member_of(&self, team: i64) -> bool {
        self.memberships.iter().any(|(t, _)| *t == team)
    }

    pub fn is_admin_of(&self, team: i64) -> bool {
        self.memberships.iter().any(|(t, admin)| *t == team && *admin)
    }

    /// Admin of the team the actor is currently working in.
    pub fn is_admin(&self) -> bool {
        self.is_admin_of(self.team_id)
    }

    pub fn default_read(&self) -> Permission {
        self.default_read.unwrap_or(Permission::DEFAULT_READ)
    }

    pub fn default_write(&self) -> Permission {
        self.default_write.unwrap_or(Permission::DEFAULT_WRITE)
    }

    #[cfg(test)]
    pub fn for_tests(user_id: i64, team_id: i64, is_admin: bool) -> Self {
        Self {
            user_id: Some(user_id),
            team_id,
            memberships: vec![(team_id, is_admin)],
            ..Self::anonymous()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_is_scoped_to_team() {
        let mut actor = Actor::for_tests(1, 10, false);
        actor.memberships.push((20, true));
        assert!(!actor.is_admin());
        assert!(actor.is_admin_of(20));
        assert!(actor.is_member_of(10));
        assert!(!actor.is_member_of(30));
    }

    #[test]
    fn test_defaults_fall_back() {
        let actor = Actor::for_tests(1, 10, false);
        assert_eq!(actor.default_read(), Permission::Team);
        assert_eq!(actor.default_write(), Permission::User);
    }
}
