//! `SHOW GRANTS FOR` row parsing.
//!
//! The server aggregates every privilege of a grantee into one wide row. Each
//! privilege class column holds `;`-separated entries of the form
//! `entity:PRIV,PRIV` (or just `PRIV,PRIV` for the global scope).

use crate::backend::Row;
use crate::entity::{Entity, EntityKind, Grantee};
use crate::error::{Error, Result};
use crate::grant::{Grant, PrivilegeGrant, RoleGrant};
use crate::privilege;

/// Entity name used when an entry carries no explicit target.
const GLOBAL_SCOPE: &str = "*.*.*";

/// One `SHOW GRANTS FOR` row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantRow {
    pub user_identity: Option<String>,
    pub comment: Option<String>,
    pub password: Option<String>,
    pub roles: Option<String>,
    pub global_privs: Option<String>,
    pub catalog_privs: Option<String>,
    pub database_privs: Option<String>,
    pub table_privs: Option<String>,
    pub col_privs: Option<String>,
    pub resource_privs: Option<String>,
    pub workload_group_privs: Option<String>,
}

impl GrantRow {
    /// Map a result row by column position.
    pub fn from_row(row: &Row) -> Self {
        Self {
            user_identity: row.get(0),
            comment: row.get(1),
            password: row.get(2),
            roles: row.get(3),
            global_privs: row.get(4),
            catalog_privs: row.get(5),
            database_privs: row.get(6),
            table_privs: row.get(7),
            col_privs: row.get(8),
            resource_privs: row.get(9),
            workload_group_privs: row.get(10),
        }
    }

    /// Privilege class columns paired with the entity kind they target.
    fn privilege_columns(&self) -> [(Option<&str>, EntityKind); 7] {
        [
            (self.global_privs.as_deref(), EntityKind::Table),
            (self.catalog_privs.as_deref(), EntityKind::Table),
            (self.database_privs.as_deref(), EntityKind::Table),
            (self.table_privs.as_deref(), EntityKind::Table),
            (self.col_privs.as_deref(), EntityKind::Table),
            (self.resource_privs.as_deref(), EntityKind::Resource),
            (self.workload_group_privs.as_deref(), EntityKind::WorkloadGroup),
        ]
    }
}

/// Parse a grantee identity such as `'jdoe'@'%'` or `analyst`.
pub fn parse_grantee(identity: &str) -> Grantee {
    let unquote = |s: &str| s.trim().trim_matches(|c| c == '\'' || c == '"' || c == '`').to_string();
    let mut parts = identity.split('@');
    let name = parts.next().map(unquote).unwrap_or_default();
    match parts.next() {
        Some(host) => Grantee::user(name, unquote(host)),
        None => Grantee::role(name),
    }
}

/// Turn one row into the grants it describes.
///
/// Any malformed entry fails the whole row; a partial list would make a
/// missing grant indistinguishable from an unparsable one.
pub fn parse_row(row: &GrantRow) -> Result<Vec<Grant>> {
    let grantee = parse_grantee(row.user_identity.as_deref().unwrap_or_default());
    let mut grants = Vec::new();

    for (column, kind) in row.privilege_columns() {
        let Some(column) = column.filter(|c| !c.is_empty()) else {
            continue;
        };
        for entry in column.split(';') {
            grants.push(parse_entry(entry, kind, &grantee)?.into());
        }
    }

    if let Some(roles) = row.roles.as_deref().filter(|r| !r.trim().is_empty()) {
        let roles = roles
            .split(',')
            .map(|r| r.trim().trim_matches('\'').to_string())
            .filter(|r| !r.is_empty())
            .collect();
        grants.push(RoleGrant::new(roles, grantee.clone()).into());
    }

    Ok(grants)
}

fn parse_entry(entry: &str, kind: EntityKind, grantee: &Grantee) -> Result<PrivilegeGrant> {
    let parts: Vec<&str> = entry.split(':').collect();
    let (name, privileges) = match parts.as_slice() {
        [name, privileges] => (name.trim(), privileges.trim()),
        [privileges] => (GLOBAL_SCOPE, privileges.trim()),
        _ => {
            return Err(Error::MalformedPrivilegeField {
                entry: entry.to_string(),
            });
        }
    };

    // The server spells "everything" as a bare `*` at some scopes.
    let name = if kind == EntityKind::Table && name == "*" {
        GLOBAL_SCOPE
    } else {
        name
    };

    let raw = privilege::split_list(privileges);
    Ok(PrivilegeGrant::new(
        privilege::normalize_all(&raw),
        Entity::new(kind, name)?,
        grantee.clone(),
    ))
}
