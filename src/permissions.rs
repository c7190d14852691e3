//! Read/write permission descriptors and their evaluation.
//!
//! A descriptor names one target class (and a group id for `Group`). It is
//! stored as a small JSON object in the `canread`/`canwrite` columns:
//! `{"base":"team"}`, `{"base":"group","target":3}`.

use serde::{Deserialize, Serialize};

use crate::actor::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "base", content = "target", rename_all = "snake_case")]
pub enum Permission {
    /// Anyone, authenticated or not.
    Public,
    /// Any authenticated user of the instance.
    Organization,
    /// Members of the entity's team.
    Team,
    /// Members of a team group.
    Group(i64),
    /// Owner and admins of the entity's team.
    User,
    /// Owner only.
    #[serde(rename = "self")]
    OwnerOnly,
}

impl Permission {
    pub const DEFAULT_READ: Permission = Permission::Team;
    pub const DEFAULT_WRITE: Permission = Permission::User;

    pub fn to_json(&self) -> String {
        // Serializing a fieldless/int-carrying enum cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"base":"user"}"#.to_string())
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Parse a stored descriptor, falling back to `User` for unreadable blobs.
    pub fn from_json_lossy(raw: &str) -> Self {
        match Self::from_json(raw) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Unreadable permission descriptor {raw:?}: {e}. Using 'user'.");
                Permission::User
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Write,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
        }
    }
}

/// The parts of an entity that permission decisions depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessTarget {
    pub owner: i64,
    pub team: i64,
    pub can_read: Permission,
    pub can_write: Permission,
}

/// Decide whether `actor` may perform `action` on `target`.
///
/// The owner always passes. Write permission implies read permission.
pub fn can_perform(target: &AccessTarget, actor: &Actor, action: Action) -> bool {
    match action {
        Action::Read if actor.bypass_read => return true,
        Action::Write if actor.bypass_write => return true,
        _ => {}
    }
    if actor.user_id == Some(target.owner) {
        return true;
    }
    match action {
        Action::Read => {
            descriptor_allows(&target.can_read, target, actor)
                || descriptor_allows(&target.can_write, target, actor)
        }
        Action::Write => descriptor_allows(&target.can_write, target, actor),
    }
}

fn descriptor_allows(descriptor: &Permission, target: &AccessTarget, actor: &Actor) -> bool {
    let authenticated = actor.user_id.is_some();
    match descriptor {
        Permission::Public => true,
        Permission::Organization => authenticated,
        Permission::Team => authenticated && actor.is_member_of(target.team),
        Permission::Group(group) => authenticated && actor.groups.contains(group),
        Permission::User => authenticated && actor.is_admin_of(target.team),
        Permission::OwnerOnly => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: i64 = 1;
    const TEAM: i64 = 10;

    fn target(can_read: Permission, can_write: Permission) -> AccessTarget {
        AccessTarget {
            owner: OWNER,
            team: TEAM,
            can_read,
            can_write,
        }
    }

    fn member(user_id: i64) -> Actor {
        Actor::for_tests(user_id, TEAM, false)
    }

    fn admin(user_id: i64) -> Actor {
        Actor::for_tests(user_id, TEAM, true)
    }

    fn outsider(user_id: i64) -> Actor {
        Actor::for_tests(user_id, 99, false)
    }

    #[test]
    fn test_json_shape() {
        assert_eq!(Permission::Team.to_json(), r#"{"base":"team"}"#);
        assert_eq!(Permission::OwnerOnly.to_json(), r#"{"base":"self"}"#);
        assert_eq!(Permission::Group(3).to_json(), r#"{"base":"group","target":3}"#);
        assert_eq!(
            Permission::from_json(r#"{"base":"group","target":7}"#).unwrap(),
            Permission::Group(7)
        );
    }

    #[test]
    fn test_lossy_parse_falls_back_to_user() {
        assert_eq!(Permission::from_json_lossy("not json"), Permission::User);
        assert_eq!(Permission::from_json_lossy(r#"{"base":"team"}"#), Permission::Team);
    }

    #[test]
    fn test_owner_always_passes() {
        let t = target(Permission::OwnerOnly, Permission::OwnerOnly);
        assert!(can_perform(&t, &member(OWNER), Action::Read));
        assert!(can_perform(&t, &member(OWNER), Action::Write));
    }

    #[test]
    fn test_owner_only_blocks_admins() {
        let t = target(Permission::OwnerOnly, Permission::OwnerOnly);
        assert!(!can_perform(&t, &admin(2), Action::Read));
        assert!(!can_perform(&t, &admin(2), Action::Write));
    }

    #[test]
    fn test_user_descriptor_admits_team_admins_only() {
        let t = target(Permission::User, Permission::User);
        assert!(can_perform(&t, &admin(2), Action::Write));
        assert!(!can_perform(&t, &member(3), Action::Read));
        assert!(!can_perform(&t, &Actor::for_tests(4, 99, true), Action::Read));
    }

    #[test]
    fn test_team_read_user_write() {
        let t = target(Permission::Team, Permission::User);
        assert!(can_perform(&t, &member(3), Action::Read));
        assert!(!can_perform(&t, &member(3), Action::Write));
        assert!(!can_perform(&t, &outsider(4), Action::Read));
    }

    #[test]
    fn test_group_descriptor() {
        let t = target(Permission::Group(5), Permission::User);
        let mut in_group = member(3);
        in_group.groups.push(5);
        assert!(can_perform(&t, &in_group, Action::Read));
        assert!(!can_perform(&t, &member(4), Action::Read));
    }

    #[test]
    fn test_organization_and_public() {
        let t = target(Permission::Organization, Permission::User);
        assert!(can_perform(&t, &outsider(4), Action::Read));
        assert!(!can_perform(&t, &Actor::anonymous(), Action::Read));

        let t = target(Permission::Public, Permission::User);
        assert!(can_perform(&t, &Actor::anonymous(), Action::Read));
        assert!(!can_perform(&t, &Actor::anonymous(), Action::Write));
    }

    #[test]
    fn test_write_implies_read() {
        let t = target(Permission::OwnerOnly, Permission::Team);
        assert!(can_perform(&t, &member(3), Action::Read));
    }

    #[test]
    fn test_bypass_flags() {
        let t = target(Permission::OwnerOnly, Permission::OwnerOnly);
        let mut a = outsider(4);
        a.bypass_read = true;
        assert!(can_perform(&t, &a, Action::Read));
        assert!(!can_perform(&t, &a, Action::Write));
    }
}
