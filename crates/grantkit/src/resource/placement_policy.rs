//! TiDB placement policies.

use super::{Lifecycle, require_id};
use crate::data::ResourceData;
use crate::error::{Error, Result};
use crate::provider::Provider;
use regex::Regex;
use std::sync::LazyLock;

pub const NAME: &str = "name";
pub const PRIMARY_REGION: &str = "primary_region";
pub const REGIONS: &str = "regions";
pub const CONSTRAINTS: &str = "constraints";

const CREATE_PREFIX: &str = "CREATE PLACEMENT POLICY IF NOT EXISTS";
const ALTER_PREFIX: &str = "ALTER PLACEMENT POLICY";

const SELECT_POLICY: &str = "SELECT POLICY_NAME, PRIMARY_REGION, REGIONS, CONSTRAINTS \
     FROM information_schema.placement_policies WHERE POLICY_NAME = ?";

static BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(.+)\]$").expect("valid brackets regex"));

/// A placement policy definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementPolicy {
    pub name: String,
    pub primary_region: String,
    pub regions: Vec<String>,
    pub constraints: Vec<String>,
}

impl PlacementPolicy {
    pub fn from_data(data: &ResourceData) -> Result<Self> {
        let name = data
            .get_non_empty(NAME)
            .ok_or_else(|| Error::validation("placement policy name is required"))?;
        Ok(Self {
            name: name.to_string(),
            primary_region: data.get_str(PRIMARY_REGION).unwrap_or_default().to_string(),
            regions: data.get_list(REGIONS),
            constraints: data.get_list(CONSTRAINTS),
        })
    }

    /// Statement defining this policy, after `prefix`.
    ///
    /// An empty constraint list is spelled out so that ALTER can clear it.
    pub fn sql(&self, prefix: &str) -> String {
        let mut parts = vec![format!("{prefix} {}", self.name)];
        if !self.primary_region.is_empty() {
            parts.push(format!("PRIMARY_REGION=\"{}\"", self.primary_region));
        }
        if !self.regions.is_empty() {
            parts.push(format!("REGIONS=\"{}\"", self.regions.join(",")));
        }
        if self.constraints.is_empty() {
            parts.push("CONSTRAINTS=\"\"".to_string());
        } else {
            parts.push(format!("CONSTRAINTS=\"[{}]\"", self.constraints.join(",")));
        }
        parts.join(" ")
    }

    fn write_to(&self, data: &mut ResourceData) {
        data.set(NAME, self.name.clone());
        data.set(PRIMARY_REGION, self.primary_region.clone());
        data.set(REGIONS, self.regions.clone());
        data.set(CONSTRAINTS, self.constraints.clone());
    }
}

/// Lifecycle of the `placement_policy` resource type.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementPolicyResource;

impl PlacementPolicyResource {
    fn define(&self, prefix: &str, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let server = provider.server_info()?;
        if !server.is_tidb() {
            return Err(Error::unsupported("placement policies", "TiDB", server));
        }

        let policy = PlacementPolicy::from_data(data)?;
        let sql = policy.sql(prefix);
        provider.execute(&sql)?;
        check_warnings(provider, &sql)?;

        data.set_id(policy.name);
        Ok(())
    }
}

impl Lifecycle for PlacementPolicyResource {
    fn resource_type(&self) -> &'static str {
        "placement_policy"
    }

    fn force_new_fields(&self) -> &'static [&'static str] {
        &[NAME]
    }

    fn create(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        self.define(CREATE_PREFIX, provider, data)
    }

    fn read(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let id = require_id(data, "read")?.to_string();
        let rows = provider.query(SELECT_POLICY, &[id.as_str()])?;

        let Some(row) = rows.first() else {
            log::debug!("Placement policy ({id}) doesn't exist");
            data.clear_id();
            return Ok(());
        };

        let regions = row.get(2).unwrap_or_default();
        let constraints = row.get(3).unwrap_or_default();
        let policy = PlacementPolicy {
            name: row.get(0).unwrap_or(id),
            primary_region: row.get(1).unwrap_or_default(),
            regions: split_list(&regions),
            constraints: BRACKETS
                .captures(&constraints)
                .map(|caps| split_list(&caps[1]))
                .unwrap_or_default(),
        };
        policy.write_to(data);
        Ok(())
    }

    fn update(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        self.define(ALTER_PREFIX, provider, data)
    }

    fn delete(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let name = match data.get_non_empty(NAME) {
            Some(name) => name.to_string(),
            None => require_id(data, "delete")?.to_string(),
        };
        provider.execute(&format!("DROP PLACEMENT POLICY IF EXISTS {name}"))?;
        data.clear_id();
        Ok(())
    }
}

fn split_list(s: &str) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split(',').map(ToString::to_string).collect()
}

/// TiDB reports some policy problems as warnings rather than errors.
fn check_warnings(provider: &Provider, statement: &str) -> Result<()> {
    let rows = provider.query("SHOW WARNINGS", &[])?;
    let Some(row) = rows.first() else {
        return Ok(());
    };

    let code = row.get_str(1).and_then(|c| c.parse::<u16>().ok()).unwrap_or(0);
    if code == 0 {
        return Ok(());
    }
    Err(Error::database(
        statement,
        Some(code),
        row.get(2).unwrap_or_default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockDatabase, Row};
    use crate::data::{Attributes, Value};
    use std::sync::Arc;

    fn policy_attrs() -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert(NAME.into(), "eu".into());
        attrs.insert(PRIMARY_REGION.into(), "eu-west-1".into());
        attrs.insert(
            REGIONS.into(),
            Value::List(vec!["eu-west-1".into(), "eu-central-1".into()]),
        );
        attrs
    }

    fn tidb() -> MockDatabase {
        let db = MockDatabase::new();
        db.set_version("8.0.11-TiDB-v7.5.1");
        db
    }

    #[test]
    fn test_sql_rendering() {
        let policy = PlacementPolicy {
            name: "eu".into(),
            primary_region: "eu-west-1".into(),
            regions: vec!["eu-west-1".into(), "eu-central-1".into()],
            constraints: Vec::new(),
        };
        assert_eq!(
            policy.sql(CREATE_PREFIX),
            "CREATE PLACEMENT POLICY IF NOT EXISTS eu PRIMARY_REGION=\"eu-west-1\" \
             REGIONS=\"eu-west-1,eu-central-1\" CONSTRAINTS=\"\""
        );

        let policy = PlacementPolicy {
            name: "ssd".into(),
            constraints: vec!["+disk=ssd".into(), "-zone=z1".into()],
            ..PlacementPolicy::default()
        };
        assert_eq!(
            policy.sql(ALTER_PREFIX),
            "ALTER PLACEMENT POLICY ssd CONSTRAINTS=\"[+disk=ssd,-zone=z1]\""
        );
    }

    #[test]
    fn test_create_on_tidb() {
        let db = tidb();
        let provider = Provider::new(Arc::new(db.clone()));
        let mut data = ResourceData::from_config(policy_attrs());

        PlacementPolicyResource.create(&provider, &mut data).unwrap();
        assert_eq!(data.id(), Some("eu"));
        assert!(db.executed()[0].starts_with(CREATE_PREFIX));
    }

    #[test]
    fn test_create_rejected_on_mysql() {
        let db = MockDatabase::new();
        let provider = Provider::new(Arc::new(db.clone()));
        let mut data = ResourceData::from_config(policy_attrs());

        let err = PlacementPolicyResource.create(&provider, &mut data).unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
        assert!(db.executed().is_empty());
    }

    #[test]
    fn test_warning_fails_create() {
        let db = tidb();
        db.add_rows(
            "SHOW WARNINGS",
            vec![Row::from_strs(&["Warning", "8239", "invalid placement option"])],
        );
        let provider = Provider::new(Arc::new(db));
        let mut data = ResourceData::from_config(policy_attrs());

        let err = PlacementPolicyResource.create(&provider, &mut data).unwrap_err();
        assert_eq!(err.code(), Some(8239));
        assert_eq!(data.id(), None);
    }

    #[test]
    fn test_read_parses_lists() {
        let db = tidb();
        db.add_rows(
            SELECT_POLICY,
            vec![Row::from_strs(&["ssd", "", "", "[+disk=ssd,-zone=z1]"])],
        );
        let provider = Provider::new(Arc::new(db));
        let mut data = ResourceData::from_import_id("ssd");

        PlacementPolicyResource.read(&provider, &mut data).unwrap();
        assert_eq!(data.get_list(CONSTRAINTS), vec!["+disk=ssd", "-zone=z1"]);
        assert!(data.get_list(REGIONS).is_empty());
        assert_eq!(data.get_str(NAME), Some("ssd"));
    }

    #[test]
    fn test_read_missing_clears_id() {
        let db = tidb();
        let provider = Provider::new(Arc::new(db));
        let mut data = ResourceData::from_import_id("gone");
        PlacementPolicyResource.read(&provider, &mut data).unwrap();
        assert_eq!(data.id(), None);
    }

    #[test]
    fn test_delete() {
        let db = tidb();
        let provider = Provider::new(Arc::new(db.clone()));
        let mut data = ResourceData::from_state("eu", policy_attrs());
        PlacementPolicyResource.delete(&provider, &mut data).unwrap();
        assert_eq!(db.executed(), vec!["DROP PLACEMENT POLICY IF EXISTS eu".to_string()]);
    }
}
