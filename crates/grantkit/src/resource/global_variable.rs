//! Global server variables.

use super::{Lifecycle, quote_identifier, quote_literal, require_id};
use crate::data::ResourceData;
use crate::error::{Error, Result};
use crate::provider::Provider;

pub const NAME: &str = "name";
pub const VALUE: &str = "value";

/// Lifecycle of the `global_variable` resource type.
///
/// Deleting a variable resets it to the server default.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalVariableResource;

impl GlobalVariableResource {
    fn set_global(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let name = data
            .get_non_empty(NAME)
            .ok_or_else(|| Error::validation("variable name is required"))?
            .to_string();
        let value = data.get_str(VALUE).unwrap_or_default();

        provider.execute(&format!(
            "SET GLOBAL {} = {}",
            quote_identifier(&name),
            value_sql(value)
        ))?;

        data.set_id(name);
        self.read(provider, data)
    }
}

impl Lifecycle for GlobalVariableResource {
    fn resource_type(&self) -> &'static str {
        "global_variable"
    }

    fn force_new_fields(&self) -> &'static [&'static str] {
        &[NAME]
    }

    fn create(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        self.set_global(provider, data)
    }

    fn read(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let id = require_id(data, "read")?.to_string();
        let rows = provider.query("SHOW GLOBAL VARIABLES WHERE VARIABLE_NAME = ?", &[id.as_str()])?;

        match rows.first() {
            Some(row) => {
                data.set(NAME, row.get(0).unwrap_or(id));
                data.set(VALUE, row.get(1).unwrap_or_default());
            }
            None => {
                log::warn!("Variable ({id}) not found; removing from state");
                data.clear_id();
            }
        }
        Ok(())
    }

    fn update(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        self.set_global(provider, data)
    }

    fn delete(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let name = match data.get_non_empty(NAME) {
            Some(name) => name.to_string(),
            None => require_id(data, "delete")?.to_string(),
        };

        let sql = format!("SET GLOBAL {} = DEFAULT", quote_identifier(&name));
        if let Err(err) = provider.execute(&sql) {
            log::warn!("Variable ({name}) could not be reset ({err}); removing from state");
        }
        data.clear_id();
        Ok(())
    }
}

/// Numbers go in bare, anything else as a string literal.
fn value_sql(value: &str) -> String {
    if value.trim().parse::<f64>().is_ok() {
        value.trim().to_string()
    } else {
        quote_literal(value)
    }
}
