//! Databases (schemas), with TiDB placement policies.

use super::{Lifecycle, quote_identifier, require_id};
use crate::data::ResourceData;
use crate::error::{Error, Result};
use crate::provider::Provider;
use regex::Regex;
use std::sync::LazyLock;

pub const NAME: &str = "name";
pub const DEFAULT_CHARACTER_SET: &str = "default_character_set";
pub const DEFAULT_COLLATION: &str = "default_collation";
pub const PLACEMENT_POLICY: &str = "placement_policy";

/// Character set declared when none is given.
pub const DEFAULT_CHARSET_VALUE: &str = "utf8mb4";
/// Collation declared alongside [`DEFAULT_CHARSET_VALUE`] when none is given.
pub const DEFAULT_COLLATION_VALUE: &str = "utf8mb4_general_ci";

/// Policy TiDB applies when none is named.
const PLACEMENT_POLICY_DEFAULT: &str = "default";

static CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"CHARACTER SET\s+`?([A-Za-z0-9_]+)`?").expect("valid charset regex")
});

static COLLATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"COLLATE\s+`?([A-Za-z0-9_]+)`?").expect("valid collate regex"));

static PLACEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"PLACEMENT POLICY\s*=\s*`([a-zA-Z0-9_-]+)`").expect("valid placement regex")
});

const DEFAULT_COLLATION_SQL: &str = "SELECT COLLATION_NAME, CHARACTER_SET_NAME \
     FROM INFORMATION_SCHEMA.COLLATIONS \
     WHERE CHARACTER_SET_NAME = ? AND `IS_DEFAULT` = 'Yes'";

/// Lifecycle of the `database` resource type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabaseResource;

impl Lifecycle for DatabaseResource {
    fn resource_type(&self) -> &'static str {
        "database"
    }

    fn force_new_fields(&self) -> &'static [&'static str] {
        &[NAME]
    }

    /// A non-default character set without a collation gets the server's
    /// default collation for it.
    fn computed_fields(&self) -> &'static [&'static str] {
        &[DEFAULT_COLLATION]
    }

    fn create(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let sql = config_sql("CREATE", provider, data)?;
        provider.execute(&sql)?;

        data.set_id(database_name(data)?);
        self.read(provider, data)
    }

    fn read(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let name = require_id(data, "read")?.to_string();
        let sql = format!("SHOW CREATE DATABASE {}", quote_identifier(&name));

        let rows = match provider.query(&sql, &[]) {
            Ok(rows) => rows,
            Err(err) if err.is_unknown_database() => {
                log::warn!("Database ({name}) not found; removing from state");
                data.clear_id();
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let create_sql = rows
            .first()
            .and_then(|row| row.get(1))
            .ok_or_else(|| Error::database(&sql, None, "no CREATE DATABASE statement returned"))?;

        let definition = parse_create_database(&create_sql);
        let collation = match (&definition.collation, &definition.charset) {
            (Some(collation), _) => collation.clone(),
            (None, Some(charset)) => default_collation(provider, charset)?,
            (None, None) => String::new(),
        };

        data.set(NAME, name);
        data.set(DEFAULT_CHARACTER_SET, definition.charset.unwrap_or_default());
        data.set(DEFAULT_COLLATION, collation);
        data.set(PLACEMENT_POLICY, definition.placement_policy.unwrap_or_default());
        Ok(())
    }

    fn update(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let sql = config_sql("ALTER", provider, data)?;
        provider.execute(&sql)?;
        self.read(provider, data)
    }

    fn delete(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let name = require_id(data, "delete")?;
        provider.execute(&format!("DROP DATABASE {}", quote_identifier(name)))?;
        data.clear_id();
        Ok(())
    }
}

/// Options recovered from `SHOW CREATE DATABASE`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseDefinition {
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub placement_policy: Option<String>,
}

/// Pull charset, collation and placement policy out of a create statement.
pub fn parse_create_database(create_sql: &str) -> DatabaseDefinition {
    let capture = |re: &Regex| re.captures(create_sql).map(|caps| caps[1].to_string());
    DatabaseDefinition {
        charset: capture(&CHARSET),
        collation: capture(&COLLATION),
        placement_policy: capture(&PLACEMENT),
    }
}

fn database_name(data: &ResourceData) -> Result<String> {
    data.get_non_empty(NAME)
        .map(ToString::to_string)
        .ok_or_else(|| Error::validation("database name is required"))
}

/// `CREATE`/`ALTER DATABASE` with the declared options.
///
/// TiDB always gets a placement clause so that removing a policy resets it.
fn config_sql(verb: &str, provider: &Provider, data: &ResourceData) -> Result<String> {
    let name = database_name(data)?;
    let mut clauses = vec![format!("{verb} DATABASE {}", quote_identifier(&name))];

    if let Some(charset) = data.get_non_empty(DEFAULT_CHARACTER_SET) {
        clauses.push(format!("CHARACTER SET {}", quote_identifier(charset)));
    }
    if let Some(collation) = data.get_non_empty(DEFAULT_COLLATION) {
        clauses.push(format!("COLLATE {}", quote_identifier(collation)));
    }

    let policy = data.get_non_empty(PLACEMENT_POLICY);
    let server = provider.server_info()?;
    if server.is_tidb() {
        let policy = policy.unwrap_or(PLACEMENT_POLICY_DEFAULT);
        clauses.push(format!("PLACEMENT POLICY={}", quote_identifier(policy)));
    } else if policy.is_some() {
        return Err(Error::unsupported(PLACEMENT_POLICY, "TiDB", server));
    }

    Ok(clauses.join(" "))
}

fn default_collation(provider: &Provider, charset: &str) -> Result<String> {
    let rows = provider.query(DEFAULT_COLLATION_SQL, &[charset])?;
    rows.first()
        .and_then(|row| row.get(0))
        .ok_or_else(|| Error::validation(format!("charset {charset} has no default collation")))
}
