//! Grant reconciliation.
//!
//! A grant resource is one [`Grant`] for one grantee: either privileges on an
//! entity or a set of roles. The server is the only source of truth; every
//! call lists the grantee's current grants with `SHOW GRANTS FOR` and looks
//! for the one that conflicts with (targets the same thing as) the declared
//! grant.
//!
//! Create and Delete run under the grantee's lock so that a concurrent
//! Create on the same grantee cannot pass the conflict check in between.

use super::Lifecycle;
use crate::backend::Database;
use crate::data::ResourceData;
use crate::entity::{Entity, EntityKind, Grantee};
use crate::error::{Error, Result};
use crate::grant::{Grant, PrivilegeGrant, RoleGrant};
use crate::parser::{GrantRow, parse_row};
use crate::privilege;
use crate::provider::Provider;
use log::{debug, warn};

pub const USER: &str = "user";
pub const HOST: &str = "host";
pub const ROLE: &str = "role";
pub const ENTITY_TYPE: &str = "entity_type";
pub const ENTITY_NAME: &str = "entity_name";
pub const PRIVILEGES: &str = "privileges";
pub const ROLES: &str = "roles";
/// Set only by importing with a trailing `@`; the grant statements never
/// carry it.
pub const GRANT_OPTION: &str = "grant_option";

/// Host used when a user is declared without one.
pub const DEFAULT_HOST: &str = "localhost";

const FORCE_NEW: &[&str] = &[USER, HOST, ROLE, ENTITY_TYPE, ENTITY_NAME, ROLES];

/// Lifecycle of the `grant` resource type.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrantResource;

impl Lifecycle for GrantResource {
    fn resource_type(&self) -> &'static str {
        "grant"
    }

    fn force_new_fields(&self) -> &'static [&'static str] {
        FORCE_NEW
    }

    fn computed_fields(&self) -> &'static [&'static str] {
        &[GRANT_OPTION]
    }

    fn create(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let desired = desired_from_data(data)?;

        provider
            .locks()
            .with_lock(&desired.grantee().id(), || -> Result<()> {
                if let Some(existing) = find_matching(provider.db(), &desired)? {
                    return Err(Error::GrantAlreadyExists {
                        desired: desired.to_string(),
                        existing: existing.to_string(),
                    });
                }
                provider.execute(&desired.grant_sql())?;
                Ok(())
            })?;

        data.set_id(desired.id());
        self.read(provider, data)
    }

    fn read(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let declared = desired_from_data(data)?;

        match find_matching(provider.db(), &declared)? {
            Some(found) => {
                apply_observed(&found, data);
                Ok(())
            }
            None => {
                warn!(
                    "Grant not found for {} - removing from state",
                    declared.grantee()
                );
                data.clear_id();
                Ok(())
            }
        }
    }

    fn update(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        if !data.has_change(PRIVILEGES) {
            return Ok(());
        }

        let grant = desired_from_data(data)?;
        let (old, new) = data.get_set_change(PRIVILEGES);
        let old: Vec<String> = old.into_iter().collect();
        let new: Vec<String> = new.into_iter().collect();
        let diff = diff_privileges(&old, &new);

        if !diff.to_revoke.is_empty() {
            let revocable =
                grant
                    .as_partially_revocable()
                    .ok_or_else(|| Error::PartialRevokeUnsupported {
                        grant: grant.to_string(),
                    })?;
            provider.execute(&revocable.partial_revoke_sql(&diff.to_revoke))?;
        }

        // The full new set is granted again, not just the additions.
        if !diff.to_grant.is_empty() {
            provider.execute(&grant.grant_sql())?;
        }

        Ok(())
    }

    fn delete(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let grant = desired_from_data(data)?;

        provider
            .locks()
            .with_lock(&grant.grantee().id(), || -> Result<()> {
                match provider.execute(&grant.revoke_sql()) {
                    Ok(_) => Ok(()),
                    Err(err) if err.category().is_ignorable() => {
                        debug!("Grant {grant} was already gone: {err}");
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            })?;

        data.clear_id();
        Ok(())
    }

    fn import(&self, provider: &Provider, id: &str) -> Result<ResourceData> {
        let import = ImportId::parse(id)?;
        let candidate: Grant =
            PrivilegeGrant::new(Vec::new(), import.entity.clone(), import.grantee.clone()).into();

        let grants = show_grants(provider.db(), &import.grantee)?;
        let found = grants
            .iter()
            .find(|grant| grant.conflicts_with(&candidate))
            .ok_or_else(|| Error::ImportNotFound {
                id: id.to_string(),
                candidates: grants.len(),
            })?;

        let mut data = ResourceData::from_import_id(id);
        apply_observed(found, &mut data);
        data.set(GRANT_OPTION, import.grant_option);
        Ok(data)
    }
}

/// Revoke and grant sets for a privilege change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegeDiff {
    /// Privileges held before and no longer declared
    pub to_revoke: Vec<String>,
    /// The full new privilege set when anything was added, else empty
    pub to_grant: Vec<String>,
}

/// Compare two privilege lists after normalizing both.
///
/// ```
/// use grantkit::resource::grant::diff_privileges;
///
/// let diff = diff_privileges(&["SELECT", "UPDATE"], &["SELECT", "INSERT"]);
/// assert_eq!(diff.to_revoke, ["UPDATE"]);
/// assert_eq!(diff.to_grant, ["INSERT", "SELECT"]);
/// ```
pub fn diff_privileges<S: AsRef<str>>(old: &[S], new: &[S]) -> PrivilegeDiff {
    let old = privilege::normalize_all(old);
    let new = privilege::normalize_all(new);

    let to_revoke = old.iter().filter(|p| !new.contains(p)).cloned().collect();
    let added = new.iter().any(|p| !old.contains(p));

    PrivilegeDiff {
        to_revoke,
        to_grant: if added { new } else { Vec::new() },
    }
}

/// Build the grant described by declared fields.
pub fn desired_from_data(data: &ResourceData) -> Result<Grant> {
    let grantee = match (data.get_non_empty(USER), data.get_non_empty(ROLE)) {
        (Some(user), _) => {
            Grantee::user(user, data.get_non_empty(HOST).unwrap_or(DEFAULT_HOST))
        }
        (None, Some(role)) => Grantee::role(role),
        (None, None) => {
            return Err(Error::validation("one of user/host or role is required"));
        }
    };

    if data.is_set(ROLES) {
        let roles = data.get_set(ROLES).into_iter().collect();
        return Ok(RoleGrant::new(roles, grantee).into());
    }

    let kind: EntityKind = data.get_non_empty(ENTITY_TYPE).unwrap_or("table").parse()?;
    let name = data
        .get_non_empty(ENTITY_NAME)
        .ok_or_else(|| Error::validation("entity_name is required for privilege grants"))?;
    let privileges: Vec<String> = data.get_set(PRIVILEGES).into_iter().collect();

    Ok(PrivilegeGrant::new(
        privilege::normalize_all(&privileges),
        Entity::new(kind, name)?,
        grantee,
    )
    .into())
}

/// Current grants of `grantee`.
///
/// A grantee the server does not know has no grants. Only the first row of
/// the result is parsed.
pub fn show_grants(db: &dyn Database, grantee: &Grantee) -> Result<Vec<Grant>> {
    let sql = format!("SHOW GRANTS FOR {}", grantee.sql());
    debug!("SQL to show grants: {sql}");

    let rows = match db.query(&sql, &[]) {
        Ok(rows) => rows,
        Err(err) if err.category().is_ignorable() => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let grants = parse_row(&GrantRow::from_row(row))?;
    debug!("Parsed {} grants for {grantee}", grants.len());
    Ok(grants)
}

/// The current grant that targets the same thing as `desired`, if any.
fn find_matching(db: &dyn Database, desired: &Grant) -> Result<Option<Grant>> {
    let grants = show_grants(db, desired.grantee())?;
    for grant in grants {
        if desired.conflicts_with(&grant) {
            return Ok(Some(grant));
        }
        debug!("Skipping grant {grant} as it doesn't match {desired}");
    }
    Ok(None)
}

/// Copy an observed grant into `data`.
///
/// Privileges are only overwritten when they differ after normalization, so
/// declared spelling survives a refresh.
fn apply_observed(grant: &Grant, data: &mut ResourceData) {
    match grant {
        Grant::Privilege(g) => {
            let declared: Vec<String> = data.get_set(PRIVILEGES).into_iter().collect();
            if !data.is_set(PRIVILEGES) || privilege::normalize_all(&declared) != g.privileges {
                data.set(PRIVILEGES, g.privileges.clone());
            }
            data.set(ENTITY_TYPE, g.entity.kind().as_str());
            data.set(ENTITY_NAME, g.entity.name());
        }
        Grant::Role(g) => data.set(ROLES, g.roles.clone()),
    }

    let grantee = grant.grantee();
    if data.is_set(ROLE) || (grantee.is_role() && !data.is_set(USER)) {
        data.set(ROLE, grantee.name.clone());
    } else {
        data.set(USER, grantee.name.clone());
        data.set(HOST, grantee.host.clone());
    }

    data.set_id(grant.id());
}

/// A parsed `user@host@entity_type@entity_name[@]` import id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportId {
    pub grantee: Grantee,
    pub entity: Entity,
    /// Set by a trailing `@`
    pub grant_option: bool,
}

impl ImportId {
    pub fn parse(id: &str) -> Result<Self> {
        let parts: Vec<&str> = id.split('@').collect();
        let grant_option = match parts.as_slice() {
            [_, _, _, _] => false,
            [_, _, _, _, ""] => true,
            _ => {
                return Err(Error::validation(format!(
                    "wrong ID format {id} - expected user@host@entity_type@entity_name \
                     (and optionally ending @ to signify grant option) where some parts can be empty"
                )));
            }
        };

        Ok(Self {
            grantee: Grantee::user(parts[0], parts[1]),
            entity: Entity::new(parts[2].parse()?, parts[3])?,
            grant_option,
        })
    }
}
