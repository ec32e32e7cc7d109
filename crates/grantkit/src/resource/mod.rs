//! Resource lifecycles.
//!
//! Every managed object type implements [`Lifecycle`]: create, read,
//! update, delete and import against a [`Provider`], with its fields carried
//! in a [`ResourceData`]. Each call is a complete round trip to the server;
//! nothing is kept between calls except what the provider owns.
//!
//! Read never fails because an object is gone. It clears the id instead and
//! leaves the caller to drop the object from its records.

use crate::data::ResourceData;
use crate::error::{Error, Result};
use crate::provider::Provider;

pub mod database;
pub mod global_variable;
pub mod grant;
pub mod placement_policy;
pub mod role;
pub mod user;

pub use database::DatabaseResource;
pub use global_variable::GlobalVariableResource;
pub use grant::GrantResource;
pub use placement_policy::PlacementPolicyResource;
pub use role::RoleResource;
pub use user::UserResource;

/// Create/read/update/delete/import for one resource type.
pub trait Lifecycle: Send + Sync {
    /// Type name used in addresses, e.g. `"grant"`.
    fn resource_type(&self) -> &'static str;

    /// Fields whose change requires destroying and recreating the object.
    fn force_new_fields(&self) -> &'static [&'static str];

    /// Optional fields the server fills in when they are left undeclared.
    fn computed_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Fields holding secrets. They are recorded as fingerprints (see
    /// [`ResourceData::seal`]) and never displayed.
    fn sensitive_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Create the object and set its id.
    fn create(&self, provider: &Provider, data: &mut ResourceData) -> Result<()>;

    /// Refresh `data` from the server, clearing the id if the object is gone.
    fn read(&self, provider: &Provider, data: &mut ResourceData) -> Result<()>;

    /// Converge in-place changes. Types without updatable fields keep the
    /// default, which only refreshes.
    fn update(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        self.read(provider, data)
    }

    /// Remove the object.
    fn delete(&self, provider: &Provider, data: &mut ResourceData) -> Result<()>;

    /// Adopt an existing object by its id.
    fn import(&self, provider: &Provider, id: &str) -> Result<ResourceData> {
        let mut data = ResourceData::from_import_id(id);
        self.read(provider, &mut data)?;
        if data.id().is_none() {
            return Err(Error::ImportNotFound {
                id: id.to_string(),
                candidates: 0,
            });
        }
        Ok(data)
    }

    /// Whether the pending changes in `data` force a replacement.
    fn requires_replacement(&self, data: &ResourceData) -> bool {
        self.force_new_fields()
            .iter()
            .any(|field| data.has_change(field))
    }
}

static GRANT: GrantResource = GrantResource;
static ROLE: RoleResource = RoleResource;
static DATABASE: DatabaseResource = DatabaseResource;
static GLOBAL_VARIABLE: GlobalVariableResource = GlobalVariableResource;
static PLACEMENT_POLICY: PlacementPolicyResource = PlacementPolicyResource;
static USER: UserResource = UserResource;

/// Every supported resource type.
pub fn all() -> [&'static dyn Lifecycle; 6] {
    [&USER, &ROLE, &DATABASE, &PLACEMENT_POLICY, &GLOBAL_VARIABLE, &GRANT]
}

/// Look up a lifecycle by type name.
pub fn lifecycle_for(resource_type: &str) -> Option<&'static dyn Lifecycle> {
    all()
        .into_iter()
        .find(|lifecycle| lifecycle.resource_type() == resource_type)
}

/// Quote an identifier with backticks.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a value as a string literal.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// The id of `data`, or a validation error naming the operation.
pub(crate) fn require_id<'a>(data: &'a ResourceData, operation: &str) -> Result<&'a str> {
    data.id()
        .ok_or_else(|| Error::validation(format!("cannot {operation} a resource without an id")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_lookup() {
        for name in [
            "grant",
            "role",
            "database",
            "global_variable",
            "placement_policy",
            "user",
        ] {
            let lifecycle = lifecycle_for(name).unwrap();
            assert_eq!(lifecycle.resource_type(), name);
        }
        assert!(lifecycle_for("table").is_none());
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_identifier("db"), "`db`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
        assert_eq!(quote_literal("ON"), "'ON'");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_requires_replacement() {
        use crate::data::{Attributes, Value};

        let state: Attributes = [("name".to_string(), Value::from("a"))].into_iter().collect();
        let config: Attributes = [("name".to_string(), Value::from("b"))].into_iter().collect();
        let data = ResourceData::for_update("a", state.clone(), config);
        assert!(ROLE.requires_replacement(&data));

        let data = ResourceData::for_update("a", state.clone(), state);
        assert!(!ROLE.requires_replacement(&data));
    }
}
