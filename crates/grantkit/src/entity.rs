//! Grant targets and grantees.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of object a privilege grant targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Catalog, database, table or column scoped object (`catalog.db.table`)
    Table,
    /// Named resource
    Resource,
    /// Workload group
    WorkloadGroup,
}

impl EntityKind {
    /// The identifier used in configuration and import ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Resource => "resource",
            Self::WorkloadGroup => "workload_group",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(Self::Table),
            "resource" => Ok(Self::Resource),
            "workload_group" => Ok(Self::WorkloadGroup),
            other => Err(Error::validation(format!(
                "unknown entity type '{other}' (expected table, resource or workload_group)"
            ))),
        }
    }
}

/// A grant target.
///
/// Table-kind names always carry three dotted segments; missing trailing
/// segments are filled with `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    kind: EntityKind,
    name: String,
}

impl Entity {
    /// Create an entity, normalizing table-kind names.
    ///
    /// A bare `*` is rejected since it is ambiguous between "all tables" and
    /// "all databases".
    pub fn new(kind: EntityKind, name: &str) -> Result<Self> {
        let name = name.trim();
        if name == "*" {
            return Err(Error::validation(
                "Invalid entity name '*'. To match all, use '*.*.*' for tables or '%' for other types.",
            ));
        }

        let name = match kind {
            EntityKind::Table => pad_table_name(name),
            EntityKind::Resource | EntityKind::WorkloadGroup => name.to_string(),
        };

        Ok(Self { kind, name })
    }

    /// Entity kind.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Normalized name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stable identity, `"<kind>:<name>"`.
    pub fn id(&self) -> String {
        format!("{}:{}", self.kind, self.name)
    }

    /// SQL rendering for the `ON` clause.
    pub fn sql(&self) -> String {
        match self.kind {
            EntityKind::Resource => format!("RESOURCE '{}'", self.name),
            EntityKind::WorkloadGroup => format!("WORKLOAD GROUP '{}'", self.name),
            EntityKind::Table => self.name.clone(),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

fn pad_table_name(name: &str) -> String {
    let mut parts: Vec<&str> = name.split('.').collect();
    while parts.len() < 3 {
        parts.push("*");
    }
    parts.join(".")
}

/// A user (`name@host`) or a role (empty host).
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Grantee {
    /// User or role name
    pub name: String,
    /// Host pattern; empty for roles
    pub host: String,
}

impl Grantee {
    /// A user at a host.
    pub fn user(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
        }
    }

    /// A role.
    pub fn role(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: String::new(),
        }
    }

    /// Whether this grantee is a role.
    pub fn is_role(&self) -> bool {
        self.host.is_empty()
    }

    /// Stable identity: `name` for roles, `name@host` for users.
    pub fn id(&self) -> String {
        if self.host.is_empty() {
            self.name.clone()
        } else {
            format!("{}@{}", self.name, self.host)
        }
    }

    /// SQL rendering for `TO` / `FROM` / `FOR` clauses.
    pub fn sql(&self) -> String {
        if self.host.is_empty() {
            format!("ROLE '{}'", self.name)
        } else {
            format!("'{}'@'{}'", self.name, self.host)
        }
    }
}

impl PartialEq for Grantee {
    /// Names match exactly; an empty host and `%` denote the same scope.
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }
        let wildcard = |h: &str| h.is_empty() || h == "%";
        if wildcard(&self.host) && wildcard(&other.host) {
            return true;
        }
        self.host == other.host
    }
}

impl fmt::Display for Grantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_padding() {
        let e = Entity::new(EntityKind::Table, "db").unwrap();
        assert_eq!(e.name(), "db.*.*");

        let e = Entity::new(EntityKind::Table, "db.tbl").unwrap();
        assert_eq!(e.name(), "db.tbl.*");

        let e = Entity::new(EntityKind::Table, "internal.db.tbl").unwrap();
        assert_eq!(e.name(), "internal.db.tbl");
    }

    #[test]
    fn test_non_table_names_are_raw() {
        let e = Entity::new(EntityKind::Resource, "spark").unwrap();
        assert_eq!(e.name(), "spark");
        assert_eq!(e.sql(), "RESOURCE 'spark'");

        let e = Entity::new(EntityKind::WorkloadGroup, "normal").unwrap();
        assert_eq!(e.sql(), "WORKLOAD GROUP 'normal'");
        assert_eq!(e.id(), "workload_group:normal");
    }

    #[test]
    fn test_bare_star_rejected() {
        let err = Entity::new(EntityKind::Table, "*").unwrap_err();
        assert!(err.to_string().contains("*.*.*"));
        assert!(Entity::new(EntityKind::Resource, "*").is_err());
        assert!(Entity::new(EntityKind::Resource, "%").is_ok());
    }

    #[test]
    fn test_entity_identity_and_sql() {
        let e = Entity::new(EntityKind::Table, "db.tbl").unwrap();
        assert_eq!(e.id(), "table:db.tbl.*");
        assert_eq!(e.sql(), "db.tbl.*");
        assert_eq!(e, Entity::new(EntityKind::Table, "db.tbl.*").unwrap());
        assert_ne!(e, Entity::new(EntityKind::Resource, "db.tbl.*").unwrap());
    }

    #[test]
    fn test_entity_kind_round_trip() {
        for kind in [EntityKind::Table, EntityKind::Resource, EntityKind::WorkloadGroup] {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("view".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_grantee_rendering() {
        let user = Grantee::user("jdoe", "example.com");
        assert_eq!(user.id(), "jdoe@example.com");
        assert_eq!(user.sql(), "'jdoe'@'example.com'");
        assert!(!user.is_role());

        let role = Grantee::role("analyst");
        assert_eq!(role.id(), "analyst");
        assert_eq!(role.sql(), "ROLE 'analyst'");
        assert!(role.is_role());
    }

    #[test]
    fn test_grantee_wildcard_host_equality() {
        assert_eq!(Grantee::user("a", "%"), Grantee::role("a"));
        assert_eq!(Grantee::user("a", "%"), Grantee::user("a", "%"));
        assert_ne!(Grantee::user("a", "localhost"), Grantee::role("a"));
        assert_ne!(Grantee::user("a", "localhost"), Grantee::user("a", "%"));
        assert_ne!(Grantee::user("a", "h"), Grantee::user("b", "h"));
        assert_eq!(Grantee::user("a", "h"), Grantee::user("a", "h"));
    }
}
