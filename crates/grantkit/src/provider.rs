//! Shared handle passed to every lifecycle call.

use crate::backend::{Database, Row};
use crate::error::Result;
use crate::locks::KeyedLocks;
use crate::server::ServerInfo;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Database handle, grantee lock registry and cached server facts.
///
/// One provider is built per run and borrowed by every worker; it is
/// `Send + Sync`.
pub struct Provider {
    db: Arc<dyn Database>,
    locks: KeyedLocks,
    server: OnceLock<ServerInfo>,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("locks", &self.locks.len())
            .field("server", &self.server.get())
            .finish_non_exhaustive()
    }
}

impl Provider {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            locks: KeyedLocks::new(),
            server: OnceLock::new(),
        }
    }

    pub fn db(&self) -> &dyn Database {
        self.db.as_ref()
    }

    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    /// Server version and dialect, detected on first use.
    pub fn server_info(&self) -> Result<&ServerInfo> {
        if let Some(info) = self.server.get() {
            return Ok(info);
        }
        let info = ServerInfo::detect(self.db.as_ref())?;
        log::info!("Connected to {info}");
        Ok(self.server.get_or_init(|| info))
    }

    /// Execute a statement, logging it first.
    pub fn execute(&self, sql: &str) -> Result<u64> {
        log::debug!("SQL: {sql}");
        self.db.execute(sql, &[])
    }

    /// Execute a statement embedding `secrets`, which are masked in the log.
    pub fn execute_redacted(&self, sql: &str, secrets: &[&str]) -> Result<u64> {
        log::debug!("SQL: {}", redact(sql, secrets));
        self.db.execute(sql, &[])
    }

    /// Run a query with positional parameters, logging it first.
    pub fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        log::debug!("SQL: {sql} {params:?}");
        self.db.query(sql, params)
    }
}

fn redact(sql: &str, secrets: &[&str]) -> String {
    secrets
        .iter()
        .filter(|secret| !secret.is_empty())
        .fold(sql.to_string(), |sql, secret| sql.replace(secret, "<SENSITIVE>"))
}
