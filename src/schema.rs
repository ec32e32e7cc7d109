//! Manifest schema.
//!
//! The manifest is a TOML file with one table per resource type, keyed by a
//! local name. Every entry becomes a resource at address `<type>.<name>`.

use anyhow::{Context, Result, bail};
use grantkit::backend::mysql::ConnectionSettings;
use grantkit::resource::{database, global_variable, grant, placement_policy, role, user};
use grantkit::{Attributes, Entity, EntityKind, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// ============================================================================
// Main Manifest Schema
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Server to connect to when no DSN is given
    #[serde(default)]
    pub connection: Option<ConnectionSettings>,

    #[serde(default)]
    pub users: BTreeMap<String, UserEntry>,

    #[serde(default)]
    pub roles: BTreeMap<String, RoleEntry>,

    #[serde(default)]
    pub grants: BTreeMap<String, GrantEntry>,

    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseEntry>,

    #[serde(default)]
    pub variables: BTreeMap<String, VariableEntry>,

    #[serde(default)]
    pub placement_policies: BTreeMap<String, PlacementPolicyEntry>,
}

/// A declared resource, ready to hand to its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredResource {
    pub resource_type: &'static str,
    pub attributes: Attributes,
}

impl Manifest {
    /// Load and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest: {}", path.display()))?;
        let manifest: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in manifest: {}", path.display()))?;
        manifest.validate()?;
        log::debug!("Loaded manifest from {}", path.display());
        Ok(manifest)
    }

    /// Like [`Manifest::load`], but a missing file is not an error.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            log::debug!("Manifest {} does not exist", path.display());
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Validate every entry.
    pub fn validate(&self) -> Result<()> {
        self.resources().map(|_| ())
    }

    /// Every declared resource keyed by address, with normalized attributes.
    pub fn resources(&self) -> Result<BTreeMap<String, DesiredResource>> {
        let mut out = BTreeMap::new();

        for (key, entry) in &self.users {
            insert(&mut out, "user", key, entry.attributes(key))?;
        }
        for (key, entry) in &self.roles {
            insert(&mut out, "role", key, entry.attributes(key))?;
        }
        for (key, entry) in &self.grants {
            let attributes = entry
                .attributes()
                .with_context(|| format!("Invalid grant '{key}'"))?;
            insert(&mut out, "grant", key, attributes)?;
        }
        for (key, entry) in &self.databases {
            insert(&mut out, "database", key, entry.attributes(key))?;
        }
        for (key, entry) in &self.variables {
            insert(&mut out, "global_variable", key, entry.attributes(key))?;
        }
        for (key, entry) in &self.placement_policies {
            insert(&mut out, "placement_policy", key, entry.attributes(key))?;
        }

        Ok(out)
    }
}

fn insert(
    out: &mut BTreeMap<String, DesiredResource>,
    resource_type: &'static str,
    key: &str,
    attributes: Attributes,
) -> Result<()> {
    if key.is_empty() || key.contains('.') {
        bail!("Invalid {resource_type} key '{key}': must be non-empty and contain no '.'");
    }
    out.insert(
        format!("{resource_type}.{key}"),
        DesiredResource {
            resource_type,
            attributes,
        },
    );
    Ok(())
}

fn put(attrs: &mut Attributes, field: &str, value: impl Into<Value>) {
    attrs.insert(field.to_string(), value.into());
}

fn put_opt(attrs: &mut Attributes, field: &str, value: Option<&String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        put(attrs, field, value.clone());
    }
}

// ============================================================================
// Users
// ============================================================================

/// A user account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserEntry {
    /// User name; defaults to the table key
    #[serde(default)]
    pub user: Option<String>,

    /// Defaults to localhost
    #[serde(default)]
    pub host: Option<String>,

    /// Plaintext password; state records only its fingerprint
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub auth_plugin: Option<String>,

    #[serde(default)]
    pub auth_string_hashed: Option<String>,

    #[serde(default)]
    pub auth_string_hex: Option<String>,

    /// NONE, SSL, X509 or a full REQUIRE clause; defaults to NONE
    #[serde(default)]
    pub tls_option: Option<String>,

    #[serde(default)]
    pub retain_old_password: bool,

    #[serde(default)]
    pub discard_old_password: bool,
}

impl UserEntry {
    fn attributes(&self, key: &str) -> Attributes {
        let mut attrs = Attributes::new();
        put(&mut attrs, user::USER, self.user.as_deref().unwrap_or(key));
        put(
            &mut attrs,
            user::HOST,
            self.host.as_deref().unwrap_or(user::DEFAULT_HOST),
        );
        put(
            &mut attrs,
            user::TLS_OPTION,
            self.tls_option.as_deref().unwrap_or(user::DEFAULT_TLS_OPTION),
        );
        put_opt(&mut attrs, user::PASSWORD, self.password.as_ref());
        put_opt(&mut attrs, user::AUTH_PLUGIN, self.auth_plugin.as_ref());
        put_opt(
            &mut attrs,
            user::AUTH_STRING_HASHED,
            self.auth_string_hashed.as_ref(),
        );
        put_opt(&mut attrs, user::AUTH_STRING_HEX, self.auth_string_hex.as_ref());
        if self.retain_old_password {
            put(&mut attrs, user::RETAIN_OLD_PASSWORD, true);
        }
        if self.discard_old_password {
            put(&mut attrs, user::DISCARD_OLD_PASSWORD, true);
        }
        attrs
    }
}

// ============================================================================
// Roles
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleEntry {
    /// Role name; defaults to the table key
    #[serde(default)]
    pub name: Option<String>,
}

impl RoleEntry {
    fn attributes(&self, key: &str) -> Attributes {
        let mut attrs = Attributes::new();
        put(&mut attrs, role::NAME, self.name.as_deref().unwrap_or(key));
        attrs
    }
}

// ============================================================================
// Grants
// ============================================================================

/// Privileges on an entity, or roles, for a user or a role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantEntry {
    #[serde(default)]
    pub user: Option<String>,

    /// Only valid together with `user`; defaults to localhost
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    /// table, resource or workload_group
    #[serde(default)]
    pub entity_type: Option<String>,

    #[serde(default)]
    pub entity_name: Option<String>,

    #[serde(default)]
    pub privileges: Vec<String>,

    #[serde(default)]
    pub roles: Vec<String>,
}

impl GrantEntry {
    fn attributes(&self) -> Result<Attributes> {
        let mut attrs = Attributes::new();

        let user = self.user.as_deref().filter(|u| !u.is_empty());
        let role = self.role.as_deref().filter(|r| !r.is_empty());
        match (user, role) {
            (Some(_), Some(_)) => bail!("'user' and 'role' are mutually exclusive"),
            (None, None) => bail!("one of 'user' or 'role' is required"),
            (Some(user), None) => {
                put(&mut attrs, grant::USER, user);
                put(
                    &mut attrs,
                    grant::HOST,
                    self.host.as_deref().unwrap_or(grant::DEFAULT_HOST),
                );
            }
            (None, Some(role)) => {
                if self.host.is_some() {
                    bail!("'host' can only be used with 'user'");
                }
                put(&mut attrs, grant::ROLE, role);
            }
        }

        match (self.privileges.is_empty(), self.roles.is_empty()) {
            (false, false) => bail!("'privileges' and 'roles' are mutually exclusive"),
            (true, true) => bail!("one of 'privileges' or 'roles' is required"),
            (true, false) => {
                if self.entity_type.is_some() || self.entity_name.is_some() {
                    bail!("role grants take no 'entity_type' or 'entity_name'");
                }
                let roles: BTreeSet<String> = self.roles.iter().cloned().collect();
                put(&mut attrs, grant::ROLES, roles);
            }
            (false, true) => {
                let kind: EntityKind = self.entity_type.as_deref().unwrap_or("table").parse()?;
                let name = self
                    .entity_name
                    .as_deref()
                    .context("'entity_name' is required with 'privileges'")?;
                let entity = Entity::new(kind, name)?;

                // The server reports privileges normalized and without
                // duplicates, so the declaration is stored the same way.
                let privileges: BTreeSet<String> =
                    grantkit::privilege::normalize_all(&self.privileges)
                        .into_iter()
                        .collect();

                put(&mut attrs, grant::ENTITY_TYPE, kind.as_str());
                put(&mut attrs, grant::ENTITY_NAME, entity.name());
                put(&mut attrs, grant::PRIVILEGES, privileges);
            }
        }

        Ok(attrs)
    }
}

// ============================================================================
// Databases
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseEntry {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub default_character_set: Option<String>,

    #[serde(default)]
    pub default_collation: Option<String>,

    /// TiDB only
    #[serde(default)]
    pub placement_policy: Option<String>,
}

impl DatabaseEntry {
    /// The character set defaults to utf8mb4. Its collation defaults only
    /// alongside that charset; any other charset gets the server's default.
    fn attributes(&self, key: &str) -> Attributes {
        let mut attrs = Attributes::new();
        put(&mut attrs, database::NAME, self.name.as_deref().unwrap_or(key));

        let charset = self
            .default_character_set
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(database::DEFAULT_CHARSET_VALUE);
        put(&mut attrs, database::DEFAULT_CHARACTER_SET, charset);

        match self.default_collation.as_ref().filter(|c| !c.is_empty()) {
            Some(collation) => put(&mut attrs, database::DEFAULT_COLLATION, collation.clone()),
            None if charset == database::DEFAULT_CHARSET_VALUE => put(
                &mut attrs,
                database::DEFAULT_COLLATION,
                database::DEFAULT_COLLATION_VALUE,
            ),
            None => {}
        }
        put_opt(
            &mut attrs,
            database::PLACEMENT_POLICY,
            self.placement_policy.as_ref(),
        );
        attrs
    }
}

// ============================================================================
// Global Variables
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableEntry {
    /// Variable name; defaults to the table key
    #[serde(default)]
    pub name: Option<String>,

    pub value: VariableValue,
}

/// A variable value as written in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl VariableValue {
    /// The value as the server reports it.
    pub fn to_server_string(&self) -> String {
        match self {
            Self::Bool(true) => "ON".to_string(),
            Self::Bool(false) => "OFF".to_string(),
            Self::Integer(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl VariableEntry {
    fn attributes(&self, key: &str) -> Attributes {
        let mut attrs = Attributes::new();
        put(
            &mut attrs,
            global_variable::NAME,
            self.name.as_deref().unwrap_or(key),
        );
        put(&mut attrs, global_variable::VALUE, self.value.to_server_string());
        attrs
    }
}

// ============================================================================
// Placement Policies
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlacementPolicyEntry {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub primary_region: Option<String>,

    #[serde(default)]
    pub regions: Vec<String>,

    #[serde(default)]
    pub constraints: Vec<String>,
}

impl PlacementPolicyEntry {
    fn attributes(&self, key: &str) -> Attributes {
        let mut attrs = Attributes::new();
        put(
            &mut attrs,
            placement_policy::NAME,
            self.name.as_deref().unwrap_or(key),
        );
        put_opt(
            &mut attrs,
            placement_policy::PRIMARY_REGION,
            self.primary_region.as_ref(),
        );
        if !self.regions.is_empty() {
            put(&mut attrs, placement_policy::REGIONS, self.regions.clone());
        }
        if !self.constraints.is_empty() {
            put(
                &mut attrs,
                placement_policy::CONSTRAINTS,
                self.constraints.clone(),
            );
        }
        attrs
    }
}

// ============================================================================
// Tests
// ============================================================================
