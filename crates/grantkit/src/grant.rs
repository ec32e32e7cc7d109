//! Grant variants.
//!
//! A grant is either a set of privileges on an [`Entity`] or a set of roles
//! assigned to a [`Grantee`]. Both share the same contract (identity, SQL for
//! granting and revoking, conflict test); only privilege grants can be
//! partially revoked.

use crate::entity::{Entity, Grantee};
use std::fmt;

/// Privileges on an entity held by a grantee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeGrant {
    /// Normalized, sorted privileges
    pub privileges: Vec<String>,
    /// Target of the privileges
    pub entity: Entity,
    /// Holder of the privileges
    pub grantee: Grantee,
}

impl PrivilegeGrant {
    /// Create a grant; the privilege list is sorted.
    pub fn new(mut privileges: Vec<String>, entity: Entity, grantee: Grantee) -> Self {
        privileges.sort();
        Self {
            privileges,
            entity,
            grantee,
        }
    }

    /// Identity, `"<grantee-id>:<entity-id>"`.
    pub fn id(&self) -> String {
        format!("{}:{}", self.grantee.id(), self.entity.id())
    }

    /// `GRANT ... ON ... TO ...` for the full privilege list.
    pub fn grant_sql(&self) -> String {
        format!(
            "GRANT {} ON {} TO {}",
            self.privileges.join(","),
            self.entity.sql(),
            self.grantee.sql()
        )
    }

    /// `REVOKE ... ON ... FROM ...` for the full privilege list.
    pub fn revoke_sql(&self) -> String {
        self.partial_revoke_sql(&self.privileges)
    }

    /// `REVOKE` for only the given privileges.
    pub fn partial_revoke_sql<S: AsRef<str>>(&self, subset: &[S]) -> String {
        let privileges: Vec<&str> = subset.iter().map(AsRef::as_ref).collect();
        format!(
            "REVOKE {} ON {} FROM {}",
            privileges.join(","),
            self.entity.sql(),
            self.grantee.sql()
        )
    }
}

/// Roles assigned to a grantee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    /// Sorted role names
    pub roles: Vec<String>,
    /// Assignee of the roles
    pub grantee: Grantee,
}

impl RoleGrant {
    /// Create a role grant; the role list is sorted.
    pub fn new(mut roles: Vec<String>, grantee: Grantee) -> Self {
        roles.sort();
        Self { roles, grantee }
    }

    /// Identity, the grantee id.
    pub fn id(&self) -> String {
        self.grantee.id()
    }

    /// `GRANT 'r1','r2' TO ...`.
    pub fn grant_sql(&self) -> String {
        format!("GRANT '{}' TO {}", self.roles.join("','"), self.grantee.sql())
    }

    /// `REVOKE 'r1','r2' FROM ...`.
    pub fn revoke_sql(&self) -> String {
        format!(
            "REVOKE '{}' FROM {}",
            self.roles.join("','"),
            self.grantee.sql()
        )
    }
}

/// A grant of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// Privileges on an entity
    Privilege(PrivilegeGrant),
    /// Roles assigned to a grantee
    Role(RoleGrant),
}

impl Grant {
    /// Stable identity string used as the resource id.
    pub fn id(&self) -> String {
        match self {
            Grant::Privilege(g) => g.id(),
            Grant::Role(g) => g.id(),
        }
    }

    /// Statement that creates this grant.
    pub fn grant_sql(&self) -> String {
        match self {
            Grant::Privilege(g) => g.grant_sql(),
            Grant::Role(g) => g.grant_sql(),
        }
    }

    /// Statement that removes this grant entirely.
    pub fn revoke_sql(&self) -> String {
        match self {
            Grant::Privilege(g) => g.revoke_sql(),
            Grant::Role(g) => g.revoke_sql(),
        }
    }

    /// The grantee holding this grant.
    pub fn grantee(&self) -> &Grantee {
        match self {
            Grant::Privilege(g) => &g.grantee,
            Grant::Role(g) => &g.grantee,
        }
    }

    /// Whether both grants cannot coexist as independently declared grants.
    ///
    /// Privilege grants conflict on an equal entity regardless of grantee,
    /// since conflicts are only ever searched within one grantee's grants.
    /// Role grants conflict on an equal grantee. Different kinds never
    /// conflict.
    pub fn conflicts_with(&self, other: &Grant) -> bool {
        match (self, other) {
            (Grant::Privilege(a), Grant::Privilege(b)) => a.entity == b.entity,
            (Grant::Role(a), Grant::Role(b)) => a.grantee == b.grantee,
            (Grant::Privilege(_), Grant::Role(_)) | (Grant::Role(_), Grant::Privilege(_)) => false,
        }
    }

    /// The partially revocable view of this grant, if it has one.
    pub fn as_partially_revocable(&self) -> Option<&PrivilegeGrant> {
        match self {
            Grant::Privilege(g) => Some(g),
            Grant::Role(_) => None,
        }
    }

    /// Privileges, for privilege grants.
    pub fn privileges(&self) -> Option<&[String]> {
        match self {
            Grant::Privilege(g) => Some(&g.privileges),
            Grant::Role(_) => None,
        }
    }

    /// Roles, for role grants.
    pub fn roles(&self) -> Option<&[String]> {
        match self {
            Grant::Privilege(_) => None,
            Grant::Role(g) => Some(&g.roles),
        }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::Privilege(g) => write!(
                f,
                "[{}] on {} for {}",
                g.privileges.join(", "),
                g.entity,
                g.grantee
            ),
            Grant::Role(g) => write!(f, "roles [{}] for {}", g.roles.join(", "), g.grantee),
        }
    }
}

impl From<PrivilegeGrant> for Grant {
    fn from(g: PrivilegeGrant) -> Self {
        Grant::Privilege(g)
    }
}

impl From<RoleGrant> for Grant {
    fn from(g: RoleGrant) -> Self {
        Grant::Role(g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;

    fn table(name: &str) -> Entity {
        Entity::new(EntityKind::Table, name).unwrap()
    }

    fn privs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_privilege_grant_sql() {
        let g = PrivilegeGrant::new(
            privs(&["UPDATE", "SELECT"]),
            table("db.tbl"),
            Grantee::user("jdoe", "%"),
        );
        assert_eq!(g.grant_sql(), "GRANT SELECT,UPDATE ON db.tbl.* TO 'jdoe'@'%'");
        assert_eq!(g.revoke_sql(), "REVOKE SELECT,UPDATE ON db.tbl.* FROM 'jdoe'@'%'");
        assert_eq!(
            g.partial_revoke_sql(&["UPDATE"]),
            "REVOKE UPDATE ON db.tbl.* FROM 'jdoe'@'%'"
        );
        assert_eq!(g.id(), "jdoe@%:table:db.tbl.*");
    }

    #[test]
    fn test_privilege_grant_on_resource() {
        let g = PrivilegeGrant::new(
            privs(&["USAGE_PRIV"]),
            Entity::new(EntityKind::Resource, "spark0").unwrap(),
            Grantee::role("etl"),
        );
        assert_eq!(g.grant_sql(), "GRANT USAGE_PRIV ON RESOURCE 'spark0' TO ROLE 'etl'");
    }

    #[test]
    fn test_role_grant_sql() {
        let g = RoleGrant::new(privs(&["writer", "reader"]), Grantee::user("svc", "10.0.0.%"));
        assert_eq!(g.grant_sql(), "GRANT 'reader','writer' TO 'svc'@'10.0.0.%'");
        assert_eq!(g.revoke_sql(), "REVOKE 'reader','writer' FROM 'svc'@'10.0.0.%'");
        assert_eq!(g.id(), "svc@10.0.0.%");
    }

    #[test]
    fn test_conflict_is_entity_scoped_for_privilege_grants() {
        let a: Grant = PrivilegeGrant::new(privs(&["SELECT"]), table("db.tbl"), Grantee::user("x", "h"))
            .into();
        let b: Grant =
            PrivilegeGrant::new(privs(&["INSERT"]), table("db.tbl.*"), Grantee::role("y")).into();
        let c: Grant =
            PrivilegeGrant::new(privs(&["SELECT"]), table("db.other"), Grantee::user("x", "h"))
                .into();

        assert!(a.conflicts_with(&b));
        assert!(b.conflicts_with(&a));
        assert!(!a.conflicts_with(&c));
    }

    #[test]
    fn test_conflict_is_grantee_scoped_for_role_grants() {
        let a: Grant = RoleGrant::new(privs(&["r1"]), Grantee::user("u", "%")).into();
        let b: Grant = RoleGrant::new(privs(&["r2"]), Grantee::role("u")).into();
        let c: Grant = RoleGrant::new(privs(&["r1"]), Grantee::user("u", "localhost")).into();

        assert!(a.conflicts_with(&b));
        assert!(!a.conflicts_with(&c));
    }

    #[test]
    fn test_cross_variant_never_conflicts() {
        let grantee = Grantee::role("r");
        let p: Grant = PrivilegeGrant::new(privs(&["SELECT"]), table("*.*.*"), grantee.clone()).into();
        let r: Grant = RoleGrant::new(privs(&["admin"]), grantee).into();
        assert!(!p.conflicts_with(&r));
        assert!(!r.conflicts_with(&p));
    }

    #[test]
    fn test_partial_revocability() {
        let p: Grant =
            PrivilegeGrant::new(privs(&["SELECT"]), table("db"), Grantee::role("r")).into();
        let r: Grant = RoleGrant::new(privs(&["admin"]), Grantee::role("r")).into();
        assert!(p.as_partially_revocable().is_some());
        assert!(r.as_partially_revocable().is_none());
        assert_eq!(p.privileges(), Some(&["SELECT".to_string()][..]));
        assert_eq!(r.roles(), Some(&["admin".to_string()][..]));
    }
}
