//! Roles.

use super::{Lifecycle, quote_identifier, require_id};
use crate::data::ResourceData;
use crate::error::{Error, Result};
use crate::provider::Provider;

pub const NAME: &str = "name";

/// Lifecycle of the `role` resource type.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleResource;

impl Lifecycle for RoleResource {
    fn resource_type(&self) -> &'static str {
        "role"
    }

    fn force_new_fields(&self) -> &'static [&'static str] {
        &[NAME]
    }

    fn create(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let name = data
            .get_non_empty(NAME)
            .ok_or_else(|| Error::validation("role name is required"))?
            .to_string();

        provider.execute(&format!("CREATE ROLE {}", quote_identifier(&name)))?;
        data.set_id(name);
        Ok(())
    }

    fn read(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let id = require_id(data, "read")?.to_string();

        let rows = provider.query("SHOW ROLES", &[])?;
        if rows.iter().any(|row| row.get_str(0) == Some(id.as_str())) {
            data.set(NAME, id);
        } else {
            log::warn!("Role ({id}) not found; removing from state");
            data.clear_id();
        }
        Ok(())
    }

    fn delete(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let name = match data.get_non_empty(NAME) {
            Some(name) => name.to_string(),
            None => require_id(data, "delete")?.to_string(),
        };

        provider.execute(&format!("DROP ROLE {}", quote_identifier(&name)))?;
        data.clear_id();
        Ok(())
    }
}
