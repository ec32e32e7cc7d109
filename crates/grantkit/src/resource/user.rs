//! User accounts, and listing them.
//!
//! A user is addressed as `USER@HOST`. Passwords are sent as escaped
//! literals, masked in the statement log and recorded only as fingerprints.

use super::{Lifecycle, quote_identifier, quote_literal, require_id};
use crate::data::{ResourceData, is_fingerprint};
use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::server::{ServerInfo, ServerVersion};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

pub const USER: &str = "user";
pub const HOST: &str = "host";
pub const PASSWORD: &str = "password";
pub const AUTH_PLUGIN: &str = "auth_plugin";
pub const AUTH_STRING_HASHED: &str = "auth_string_hashed";
pub const AUTH_STRING_HEX: &str = "auth_string_hex";
pub const TLS_OPTION: &str = "tls_option";
pub const RETAIN_OLD_PASSWORD: &str = "retain_old_password";
pub const DISCARD_OLD_PASSWORD: &str = "discard_old_password";

/// Host used when none is declared.
pub const DEFAULT_HOST: &str = "localhost";
/// TLS requirement used when none is declared.
pub const DEFAULT_TLS_OPTION: &str = "NONE";

const AWS_AUTH_PLUGIN: &str = "AWSAuthenticationPlugin";

/// First version with `REQUIRE` on `CREATE USER`/`ALTER USER`.
const REQUIRE_CLAUSE: ServerVersion = ServerVersion::new(5, 7, 0);
/// First version with `ALTER USER ... IDENTIFIED BY`.
const ALTER_USER_PASSWORD: ServerVersion = ServerVersion::new(5, 7, 6);
/// First version with dual passwords.
const DUAL_PASSWORD: ServerVersion = ServerVersion::new(8, 0, 14);

static CREATE_USER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^CREATE USER ['`]([^'`]*)['`]@['`]([^'`]*)['`] IDENTIFIED WITH ['`]([^'`]*)['`] (?:AS '((?:.*?[^\\])?)' )?REQUIRE ([^ ]*)",
    )
    .expect("valid create user regex")
});

/// Lifecycle of the `user` resource type.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserResource;

impl Lifecycle for UserResource {
    fn resource_type(&self) -> &'static str {
        "user"
    }

    fn force_new_fields(&self) -> &'static [&'static str] {
        &[USER, HOST, AUTH_PLUGIN]
    }

    fn computed_fields(&self) -> &'static [&'static str] {
        &[AUTH_PLUGIN, AUTH_STRING_HASHED]
    }

    fn sensitive_fields(&self) -> &'static [&'static str] {
        &[PASSWORD]
    }

    fn create(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let user = data
            .get_non_empty(USER)
            .ok_or_else(|| Error::validation("user name is required"))?
            .to_string();
        let host = data.get_non_empty(HOST).unwrap_or(DEFAULT_HOST).to_string();
        let tls = data
            .get_non_empty(TLS_OPTION)
            .unwrap_or(DEFAULT_TLS_OPTION)
            .to_string();

        let server = provider.server_info()?;
        check_dual_password(server, data)?;

        let mut sql = format!("CREATE USER {}", account(&user, &host));
        let authentication = authentication_clause(data, &host)?;
        if let Some(clause) = &authentication {
            sql.push(' ');
            sql.push_str(clause);
        }

        let password = data.get_non_empty(PASSWORD).map(quote_literal);
        if let Some(password) = &password {
            let keyword = if authentication.is_some() {
                "BY"
            } else {
                "IDENTIFIED BY"
            };
            sql.push_str(&format!(" {keyword} {password}"));
        }

        if server.at_least(REQUIRE_CLAUSE) {
            sql.push_str(&format!(" REQUIRE {tls}"));
        }

        provider.execute_redacted(&sql, &password.as_deref().into_iter().collect::<Vec<_>>())?;

        data.set_id(format!("{user}@{host}"));
        data.set(HOST, host);
        data.set(TLS_OPTION, tls);
        data.seal(self.sensitive_fields());
        Ok(())
    }

    fn read(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let id = require_id(data, "read")?.to_string();
        let (user, host) = split_id(&id)?;
        let server = provider.server_info()?;

        if !server.at_least(REQUIRE_CLAUSE) {
            let rows = provider.query(
                "SELECT USER FROM mysql.user WHERE USER = ? AND HOST = ?",
                &[user, host],
            )?;
            if rows.is_empty() {
                log::warn!("User ({id}) not found; removing from state");
                data.clear_id();
            } else {
                data.set(USER, user);
                data.set(HOST, host);
            }
            return Ok(());
        }

        let sql = format!("SHOW CREATE USER {}", account(user, host));
        let rows = match provider.query(&sql, &[]) {
            Ok(rows) => rows,
            Err(err) if err.is_unknown_user() => {
                log::warn!("User ({id}) not found; removing from state");
                data.clear_id();
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let Some(statement) = rows.first().and_then(|row| row.get(0)) else {
            log::warn!("User ({id}) not found; removing from state");
            data.clear_id();
            return Ok(());
        };

        data.set(USER, user);
        data.set(HOST, host);
        match parse_create_user(&statement) {
            Some(definition) => {
                data.set(AUTH_PLUGIN, definition.auth_plugin);
                data.set(AUTH_STRING_HASHED, definition.auth_string_hashed);
                data.set(TLS_OPTION, definition.tls_option);
            }
            // MariaDB words its statement differently; the account exists.
            None if statement.starts_with("CREATE USER") => {
                log::debug!("Unrecognized CREATE USER form for {id}: {statement}");
            }
            None => {
                return Err(Error::database(
                    sql,
                    None,
                    format!("unexpected SHOW CREATE USER output: {statement}"),
                ));
            }
        }
        Ok(())
    }

    fn update(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let id = require_id(data, "update")?.to_string();
        let (user, host) = split_id(&id)?;
        let account = account(user, host);
        let tls = data
            .get_non_empty(TLS_OPTION)
            .unwrap_or(DEFAULT_TLS_OPTION)
            .to_string();

        let server = provider.server_info()?;
        check_dual_password(server, data)?;

        let authentication_changed = [TLS_OPTION, AUTH_PLUGIN, AUTH_STRING_HASHED, AUTH_STRING_HEX]
            .iter()
            .any(|field| data.has_change(field));
        let mut tls_applied = false;
        if data.is_set(AUTH_PLUGIN)
            && authentication_changed
            && let Some(clause) = authentication_clause(data, host)?
        {
            provider.execute(&format!("ALTER USER {account} {clause} REQUIRE {tls}"))?;
            tls_applied = true;
        }

        if data.get_bool(DISCARD_OLD_PASSWORD) && data.has_change(DISCARD_OLD_PASSWORD) {
            provider.execute(&format!("ALTER USER {account} DISCARD OLD PASSWORD"))?;
        }

        if data.has_change(PASSWORD) {
            match data.get_non_empty(PASSWORD).filter(|pw| !is_fingerprint(pw)) {
                Some(password) => {
                    let password = quote_literal(password);
                    let sql = if data.get_bool(RETAIN_OLD_PASSWORD) {
                        format!("ALTER USER {account} IDENTIFIED BY {password} RETAIN CURRENT PASSWORD")
                    } else if server.at_least(ALTER_USER_PASSWORD) {
                        format!("ALTER USER {account} IDENTIFIED BY {password}")
                    } else {
                        format!("SET PASSWORD FOR {account} = PASSWORD({password})")
                    };
                    provider.execute_redacted(&sql, &[password.as_str()])?;
                }
                None => {
                    log::warn!("Password of {id} is no longer declared; leaving it unchanged");
                }
            }
        }

        if data.has_change(TLS_OPTION) && !tls_applied && server.at_least(REQUIRE_CLAUSE) {
            provider.execute(&format!("ALTER USER {account} REQUIRE {tls}"))?;
        }

        data.set(TLS_OPTION, tls);
        data.seal(self.sensitive_fields());
        Ok(())
    }

    fn delete(&self, provider: &Provider, data: &mut ResourceData) -> Result<()> {
        let id = require_id(data, "delete")?.to_string();
        let (user, host) = split_id(&id)?;
        provider.execute(&format!("DROP USER {}", account(user, host)))?;
        data.clear_id();
        Ok(())
    }
}

/// Fields recovered from `SHOW CREATE USER`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDefinition {
    pub user: String,
    pub host: String,
    pub auth_plugin: String,
    pub auth_string_hashed: String,
    pub tls_option: String,
}

/// Parse a MySQL `CREATE USER` statement. MariaDB forms yield `None`.
pub fn parse_create_user(statement: &str) -> Option<UserDefinition> {
    let caps = CREATE_USER.captures(statement)?;
    let group = |i: usize| caps.get(i).map_or(String::new(), |m| m.as_str().to_string());
    Some(UserDefinition {
        user: group(1),
        host: group(2),
        auth_plugin: group(3),
        auth_string_hashed: group(4),
        tls_option: group(5),
    })
}

/// `'user'@'host'`.
fn account(user: &str, host: &str) -> String {
    format!("{}@{}", quote_literal(user), quote_literal(host))
}

/// Split a `USER@HOST` id at its first `@`.
fn split_id(id: &str) -> Result<(&str, &str)> {
    id.split_once('@')
        .ok_or_else(|| Error::validation(format!("wrong ID format {id} (expected USER@HOST)")))
}

fn check_dual_password(server: &ServerInfo, data: &ResourceData) -> Result<()> {
    for field in [RETAIN_OLD_PASSWORD, DISCARD_OLD_PASSWORD] {
        if data.get_bool(field) && !server.at_least(DUAL_PASSWORD) {
            return Err(Error::unsupported(field, format!("MySQL {DUAL_PASSWORD}"), server));
        }
    }
    Ok(())
}

/// The `IDENTIFIED WITH` clause for the declared plugin and auth string.
fn authentication_clause(data: &ResourceData, host: &str) -> Result<Option<String>> {
    let hashed = data.get_non_empty(AUTH_STRING_HASHED);
    let hex = data.get_non_empty(AUTH_STRING_HEX);
    if hashed.is_some() && hex.is_some() {
        return Err(Error::validation(format!(
            "{AUTH_STRING_HASHED} and {AUTH_STRING_HEX} cannot both be set"
        )));
    }

    let Some(plugin) = data.get_non_empty(AUTH_PLUGIN) else {
        if let Some(field) = [(AUTH_STRING_HASHED, hashed), (AUTH_STRING_HEX, hex)]
            .into_iter()
            .find_map(|(field, value)| value.map(|_| field))
        {
            return Err(Error::validation(format!("{field} requires {AUTH_PLUGIN}")));
        }
        return Ok(None);
    };

    if plugin == AWS_AUTH_PLUGIN {
        if host == DEFAULT_HOST {
            return Err(Error::validation(format!(
                "{AWS_AUTH_PLUGIN} cannot be used with host {DEFAULT_HOST}"
            )));
        }
        return Ok(Some(format!("IDENTIFIED WITH {AWS_AUTH_PLUGIN} AS 'RDS'")));
    }

    let mut clause = format!("IDENTIFIED WITH {}", quote_identifier(plugin));
    if let Some(hashed) = hashed {
        clause.push_str(&format!(" AS {}", quote_literal(hashed)));
    } else if let Some(hex) = hex {
        clause.push_str(&format!(" AS 0x{}", normalize_hex(hex)?));
    }
    Ok(Some(clause))
}

/// Validate a hex auth string, dropping an optional `0x` prefix.
fn normalize_hex(raw: &str) -> Result<String> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(Error::validation(format!(
            "{AUTH_STRING_HEX} must have an even, non-zero number of digits"
        )));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::validation(format!(
            "{AUTH_STRING_HEX} contains non-hex characters"
        )));
    }
    Ok(digits.to_uppercase())
}

/// One account row from `mysql.user`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Account {
    pub user: String,
    pub host: String,
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.host)
    }
}

/// Which accounts [`list_users`] returns.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// `LIKE` pattern on the user name
    pub user_pattern: Option<String>,
    /// `LIKE` pattern on the host
    pub host_pattern: Option<String>,
    /// Accounts to leave out, as `user@host`
    pub exclude: Vec<String>,
}

/// Accounts on the server matching `filter`.
pub fn list_users(provider: &Provider, filter: &UserFilter) -> Result<Vec<Account>> {
    let mut conditions = Vec::new();
    let mut params = Vec::new();
    if let Some(pattern) = &filter.user_pattern {
        conditions.push("User LIKE ?");
        params.push(pattern.as_str());
    }
    if let Some(pattern) = &filter.host_pattern {
        conditions.push("Host LIKE ?");
        params.push(pattern.as_str());
    }

    let mut sql = "SELECT User, Host FROM mysql.user".to_string();
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    let mut accounts: Vec<Account> = provider
        .query(&sql, &params)?
        .iter()
        .map(|row| Account {
            user: row.get(0).unwrap_or_default(),
            host: row.get(1).unwrap_or_default(),
        })
        .filter(|account| !filter.exclude.contains(&account.to_string()))
        .collect();
    accounts.sort();
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockDatabase, Row};
    use crate::data::{Attributes, Value, fingerprint, is_fingerprint_of};
    use crate::error::{ER_CANNOT_USER, ErrorCategory};
    use std::sync::Arc;

    fn attrs(pairs: &[(&str, Value)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn setup(version: &str) -> (MockDatabase, Provider) {
        let db = MockDatabase::new();
        db.set_version(version);
        let provider = Provider::new(Arc::new(db.clone()));
        (db, provider)
    }

    #[test]
    fn test_create_with_password() {
        let (db, provider) = setup("8.0.36");
        let mut data = ResourceData::from_config(attrs(&[
            (USER, "jdoe".into()),
            (HOST, "%".into()),
            (PASSWORD, "s3cr'et".into()),
        ]));

        UserResource.create(&provider, &mut data).unwrap();

        assert_eq!(
            db.executed(),
            vec!["CREATE USER 'jdoe'@'%' IDENTIFIED BY 's3cr''et' REQUIRE NONE".to_string()]
        );
        assert_eq!(data.id(), Some("jdoe@%"));
        assert_eq!(data.get_str(TLS_OPTION), Some("NONE"));
        assert!(is_fingerprint_of(data.get_str(PASSWORD).unwrap(), "s3cr'et"));
    }

    #[test]
    fn test_create_defaults_host_and_skips_require_on_old_servers() {
        let (db, provider) = setup("5.6.51-log");
        let mut data = ResourceData::from_config(attrs(&[(USER, "app".into())]));

        UserResource.create(&provider, &mut data).unwrap();

        assert_eq!(db.executed(), vec!["CREATE USER 'app'@'localhost'".to_string()]);
        assert_eq!(data.id(), Some("app@localhost"));
    }

    #[test]
    fn test_create_with_plugin_and_auth_string() {
        let (db, provider) = setup("8.0.36");
        let mut data = ResourceData::from_config(attrs(&[
            (USER, "app".into()),
            (HOST, "%".into()),
            (AUTH_PLUGIN, "mysql_native_password".into()),
            (AUTH_STRING_HASHED, "*ABC".into()),
            (TLS_OPTION, "SSL".into()),
        ]));
        UserResource.create(&provider, &mut data).unwrap();

        let mut hex = ResourceData::from_config(attrs(&[
            (USER, "bin".into()),
            (HOST, "%".into()),
            (AUTH_PLUGIN, "caching_sha2_password".into()),
            (AUTH_STRING_HEX, "0xab01".into()),
        ]));
        UserResource.create(&provider, &mut hex).unwrap();

        assert_eq!(
            db.executed(),
            vec![
                "CREATE USER 'app'@'%' IDENTIFIED WITH `mysql_native_password` AS '*ABC' REQUIRE SSL"
                    .to_string(),
                "CREATE USER 'bin'@'%' IDENTIFIED WITH `caching_sha2_password` AS 0xAB01 REQUIRE NONE"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_create_password_after_plugin_uses_by() {
        let (db, provider) = setup("8.0.36");
        let mut data = ResourceData::from_config(attrs(&[
            (USER, "app".into()),
            (HOST, "%".into()),
            (AUTH_PLUGIN, "caching_sha2_password".into()),
            (PASSWORD, "pw".into()),
        ]));
        UserResource.create(&provider, &mut data).unwrap();
        assert_eq!(
            db.executed(),
            vec![
                "CREATE USER 'app'@'%' IDENTIFIED WITH `caching_sha2_password` BY 'pw' REQUIRE NONE"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_invalid_auth_strings_are_rejected() {
        let (db, provider) = setup("8.0.36");
        let cases: [Vec<(&str, Value)>; 5] = [
            vec![(AUTH_STRING_HASHED, "*ABC".into())],
            vec![
                (AUTH_PLUGIN, "p".into()),
                (AUTH_STRING_HASHED, "*ABC".into()),
                (AUTH_STRING_HEX, "AB".into()),
            ],
            vec![(AUTH_PLUGIN, "p".into()), (AUTH_STRING_HEX, "ABC".into())],
            vec![(AUTH_PLUGIN, "p".into()), (AUTH_STRING_HEX, "0xZZ".into())],
            vec![(AUTH_PLUGIN, AWS_AUTH_PLUGIN.into())],
        ];

        for extra in cases {
            let mut pairs: Vec<(&str, Value)> = vec![(USER, "u".into())];
            pairs.extend(extra);
            let mut data = ResourceData::from_config(attrs(&pairs));
            let err = UserResource.create(&provider, &mut data).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Validation, "{err}");
        }
        assert!(db.executed().is_empty());
    }

    #[test]
    fn test_aws_plugin_on_remote_host() {
        let (db, provider) = setup("8.0.36");
        let mut data = ResourceData::from_config(attrs(&[
            (USER, "iam".into()),
            (HOST, "%".into()),
            (AUTH_PLUGIN, AWS_AUTH_PLUGIN.into()),
        ]));
        UserResource.create(&provider, &mut data).unwrap();
        assert_eq!(
            db.executed(),
            vec![
                "CREATE USER 'iam'@'%' IDENTIFIED WITH AWSAuthenticationPlugin AS 'RDS' REQUIRE NONE"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_dual_password_needs_recent_server() {
        let (db, provider) = setup("5.7.44");
        let mut data = ResourceData::from_config(attrs(&[
            (USER, "u".into()),
            (RETAIN_OLD_PASSWORD, true.into()),
        ]));
        let err = UserResource.create(&provider, &mut data).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unsupported);
        assert!(err.to_string().contains("MySQL 8.0.14"), "{err}");
        assert!(db.executed().is_empty());
    }

    #[test]
    fn test_read_parses_show_create_user() {
        let (db, provider) = setup("8.0.36");
        db.add_rows(
            "SHOW CREATE USER 'jdoe'@'%'",
            vec![Row::from_strs(&[
                "CREATE USER `jdoe`@`%` IDENTIFIED WITH 'mysql_native_password' AS '*6BB4837EB74329105EE4568DDA7DC67ED2CA2AD9' REQUIRE SSL PASSWORD EXPIRE DEFAULT ACCOUNT UNLOCK",
            ])],
        );

        let mut data = ResourceData::from_state("jdoe@%", Attributes::new());
        UserResource.read(&provider, &mut data).unwrap();

        assert_eq!(data.id(), Some("jdoe@%"));
        assert_eq!(data.get_str(USER), Some("jdoe"));
        assert_eq!(data.get_str(HOST), Some("%"));
        assert_eq!(data.get_str(AUTH_PLUGIN), Some("mysql_native_password"));
        assert_eq!(
            data.get_str(AUTH_STRING_HASHED),
            Some("*6BB4837EB74329105EE4568DDA7DC67ED2CA2AD9")
        );
        assert_eq!(data.get_str(TLS_OPTION), Some("SSL"));
    }

    #[test]
    fn test_read_accepts_mariadb_statement() {
        let (db, provider) = setup("10.11.6-MariaDB");
        db.add_rows(
            "SHOW CREATE USER 'jdoe'@'%'",
            vec![Row::from_strs(&["CREATE USER `jdoe`@`%` IDENTIFIED BY PASSWORD '*6BB4'"])],
        );
        let mut data = ResourceData::from_state("jdoe@%", Attributes::new());
        UserResource.read(&provider, &mut data).unwrap();
        assert_eq!(data.id(), Some("jdoe@%"));
        assert_eq!(data.get_str(AUTH_PLUGIN), None);

        db.add_rows("SHOW CREATE USER 'odd'@'%'", vec![Row::from_strs(&["GRANT USAGE"])]);
        let mut data = ResourceData::from_state("odd@%", Attributes::new());
        assert!(UserResource.read(&provider, &mut data).is_err());
    }

    #[test]
    fn test_read_missing_user_clears_id() {
        let (db, provider) = setup("8.0.36");
        db.fail_with(
            "SHOW CREATE USER 'ghost'",
            ER_CANNOT_USER,
            "Operation SHOW CREATE USER failed for 'ghost'@'%'",
        );
        let mut data = ResourceData::from_state("ghost@%", Attributes::new());
        UserResource.read(&provider, &mut data).unwrap();
        assert_eq!(data.id(), None);
    }

    #[test]
    fn test_read_on_old_server_checks_user_table() {
        let (db, provider) = setup("5.6.51");
        db.add_rows(
            "SELECT USER FROM mysql.user WHERE USER = ? AND HOST = ?",
            vec![Row::from_strs(&["jdoe"])],
        );
        let mut data = ResourceData::from_state("jdoe@localhost", Attributes::new());
        UserResource.read(&provider, &mut data).unwrap();
        assert_eq!(data.id(), Some("jdoe@localhost"));
        assert_eq!(data.get_str(HOST), Some("localhost"));
    }

    #[test]
    fn test_update_password() {
        let state = attrs(&[
            (USER, "jdoe".into()),
            (HOST, "%".into()),
            (PASSWORD, fingerprint("old").into()),
            (TLS_OPTION, "NONE".into()),
        ]);
        let config = |extra: Vec<(&str, Value)>| {
            let mut pairs: Vec<(&str, Value)> = vec![
                (USER, "jdoe".into()),
                (HOST, "%".into()),
                (PASSWORD, "new".into()),
                (TLS_OPTION, "NONE".into()),
            ];
            pairs.extend(extra);
            attrs(&pairs)
        };

        let (db, provider) = setup("8.0.36");
        let mut data = ResourceData::for_update("jdoe@%", state.clone(), config(vec![]));
        UserResource.update(&provider, &mut data).unwrap();
        assert!(is_fingerprint_of(data.get_str(PASSWORD).unwrap(), "new"));

        let mut data = ResourceData::for_update(
            "jdoe@%",
            state.clone(),
            config(vec![(RETAIN_OLD_PASSWORD, true.into())]),
        );
        UserResource.update(&provider, &mut data).unwrap();
        assert_eq!(
            db.executed(),
            vec![
                "ALTER USER 'jdoe'@'%' IDENTIFIED BY 'new'".to_string(),
                "ALTER USER 'jdoe'@'%' IDENTIFIED BY 'new' RETAIN CURRENT PASSWORD".to_string(),
            ]
        );

        let (db, provider) = setup("5.7.5");
        let mut data = ResourceData::for_update("jdoe@%", state, config(vec![]));
        UserResource.update(&provider, &mut data).unwrap();
        assert_eq!(
            db.executed(),
            vec!["SET PASSWORD FOR 'jdoe'@'%' = PASSWORD('new')".to_string()]
        );
    }

    #[test]
    fn test_update_without_declared_password_keeps_it() {
        let (db, provider) = setup("8.0.36");
        let state = attrs(&[(USER, "jdoe".into()), (PASSWORD, fingerprint("old").into())]);
        let config = attrs(&[(USER, "jdoe".into())]);
        let mut data = ResourceData::for_update("jdoe@%", state, config);
        UserResource.update(&provider, &mut data).unwrap();
        assert!(db.executed().is_empty());
    }

    #[test]
    fn test_update_tls_and_authentication() {
        let (db, provider) = setup("8.0.36");
        let state = attrs(&[(USER, "app".into()), (TLS_OPTION, "NONE".into())]);
        let config = attrs(&[(USER, "app".into()), (TLS_OPTION, "X509".into())]);
        let mut data = ResourceData::for_update("app@%", state, config);
        UserResource.update(&provider, &mut data).unwrap();

        let state = attrs(&[
            (AUTH_PLUGIN, "mysql_native_password".into()),
            (AUTH_STRING_HASHED, "*OLD".into()),
        ]);
        let config = attrs(&[
            (AUTH_PLUGIN, "mysql_native_password".into()),
            (AUTH_STRING_HASHED, "*NEW".into()),
            (DISCARD_OLD_PASSWORD, true.into()),
        ]);
        let mut data = ResourceData::for_update("svc@%", state, config);
        UserResource.update(&provider, &mut data).unwrap();

        assert_eq!(
            db.executed(),
            vec![
                "ALTER USER 'app'@'%' REQUIRE X509".to_string(),
                "ALTER USER 'svc'@'%' IDENTIFIED WITH `mysql_native_password` AS '*NEW' REQUIRE NONE"
                    .to_string(),
                "ALTER USER 'svc'@'%' DISCARD OLD PASSWORD".to_string(),
            ]
        );
    }

    #[test]
    fn test_delete_and_import() {
        let (db, provider) = setup("8.0.36");
        let mut data = ResourceData::from_state("jdoe@%", Attributes::new());
        UserResource.delete(&provider, &mut data).unwrap();
        assert_eq!(data.id(), None);
        assert_eq!(db.executed(), vec!["DROP USER 'jdoe'@'%'".to_string()]);

        db.add_rows(
            "SHOW CREATE USER 'jdoe'@'%'",
            vec![Row::from_strs(&[
                "CREATE USER 'jdoe'@'%' IDENTIFIED WITH 'caching_sha2_password' REQUIRE NONE",
            ])],
        );
        let imported = UserResource.import(&provider, "jdoe@%").unwrap();
        assert_eq!(imported.get_str(AUTH_PLUGIN), Some("caching_sha2_password"));
        assert_eq!(imported.get_str(AUTH_STRING_HASHED), Some(""));

        let err = UserResource.import(&provider, "jdoe").unwrap_err();
        assert!(err.to_string().contains("expected USER@HOST"), "{err}");
        assert!(UserResource.import(&provider, "ghost@%").is_err());
    }

    #[test]
    fn test_list_users() {
        let (db, provider) = setup("8.0.36");
        db.add_rows(
            "SELECT User, Host FROM mysql.user WHERE User LIKE ? AND Host LIKE ?",
            vec![
                Row::from_strs(&["app", "%"]),
                Row::from_strs(&["admin", "%"]),
                Row::from_strs(&["app_ro", "%"]),
            ],
        );
        let filter = UserFilter {
            user_pattern: Some("a%".into()),
            host_pattern: Some("%".into()),
            exclude: vec!["app_ro@%".into()],
        };

        let accounts = list_users(&provider, &filter).unwrap();
        let names: Vec<String> = accounts.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["admin@%", "app@%"]);

        assert!(list_users(&provider, &UserFilter::default()).unwrap().is_empty());
    }
}
