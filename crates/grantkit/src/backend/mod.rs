//! Database handle abstraction.
//!
//! This module provides the [`Database`] trait that every reconciliation
//! operation talks to, and implementations of it. The production
//! implementation is [`mysql::MySqlDatabase`].
//!
//! # Testing
//!
//! Use [`MockDatabase`] to script server responses without a live server:
//!
//! ```
//! use grantkit::backend::{Database, MockDatabase, Row};
//!
//! let db = MockDatabase::new();
//! db.add_rows("SHOW ROLES", vec![Row::from_strs(&["analyst"])]);
//!
//! let rows = db.query("SHOW ROLES", &[]).unwrap();
//! assert_eq!(rows[0].get_str(0), Some("analyst"));
//!
//! db.execute("DROP ROLE `analyst`", &[]).unwrap();
//! assert_eq!(db.executed(), vec!["DROP ROLE `analyst`".to_string()]);
//! ```

pub mod mysql;

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A handle capable of running statements against the server.
///
/// Implementations must be safe to share across worker threads; every
/// reconciliation call borrows the same handle.
pub trait Database: Send + Sync {
    /// Execute a statement, returning the number of affected rows.
    ///
    /// `params` are bound positionally to `?` placeholders.
    fn execute(&self, sql: &str, params: &[&str]) -> Result<u64>;

    /// Run a query and collect its rows.
    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>>;

    /// Raw server version string, as returned by `SELECT VERSION()`.
    fn server_version_string(&self) -> Result<String> {
        let sql = "SELECT VERSION()";
        let rows = self.query(sql, &[])?;
        rows.first()
            .and_then(|row| row.get_str(0))
            .map(ToString::to_string)
            .ok_or_else(|| Error::database(sql, None, "server returned no version"))
    }
}

/// One result row with nullable text cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<Option<String>>,
}

impl Row {
    /// Create a row from nullable cells.
    pub fn new(cells: Vec<Option<String>>) -> Self {
        Self { cells }
    }

    /// Create a row where every cell is non-null.
    pub fn from_strs(cells: &[&str]) -> Self {
        Self {
            cells: cells.iter().map(|c| Some((*c).to_string())).collect(),
        }
    }

    /// Cell at `index`; `None` when null or out of range.
    pub fn get(&self, index: usize) -> Option<String> {
        self.get_str(index).map(ToString::to_string)
    }

    /// Borrowed cell at `index`; `None` when null or out of range.
    pub fn get_str(&self, index: usize) -> Option<&str> {
        self.cells.get(index).and_then(|c| c.as_deref())
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Scripted in-memory database for tests and offline runs.
///
/// Query responses are keyed by the exact statement text. Failures are
/// matched by statement prefix so a test can fail every `GRANT` at once.
/// Executed statements are recorded in order.
#[derive(Debug, Clone, Default)]
pub struct MockDatabase {
    responses: Arc<Mutex<HashMap<String, Vec<Row>>>>,
    failures: Arc<Mutex<Vec<(String, u16, String)>>>,
    executed: Arc<Mutex<Vec<String>>>,
    version: Arc<Mutex<Option<String>>>,
}

impl MockDatabase {
    /// Create a new empty mock database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `sql` with `rows`.
    pub fn add_rows(&self, sql: impl Into<String>, rows: Vec<Row>) {
        lock(&self.responses).insert(sql.into(), rows);
    }

    /// Fail every statement starting with `prefix` with a server error code.
    pub fn fail_with(&self, prefix: impl Into<String>, code: u16, message: impl Into<String>) {
        lock(&self.failures).push((prefix.into(), code, message.into()));
    }

    /// Report `version` from `SELECT VERSION()`.
    pub fn set_version(&self, version: impl Into<String>) {
        *lock(&self.version) = Some(version.into());
    }

    /// Statements passed to [`Database::execute`], in order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.executed).clone()
    }

    fn failure_for(&self, sql: &str) -> Option<Error> {
        lock(&self.failures)
            .iter()
            .find(|(prefix, _, _)| sql.starts_with(prefix.as_str()))
            .map(|(_, code, message)| Error::database(sql, Some(*code), message.clone()))
    }
}

impl Database for MockDatabase {
    fn execute(&self, sql: &str, _params: &[&str]) -> Result<u64> {
        if let Some(err) = self.failure_for(sql) {
            return Err(err);
        }
        lock(&self.executed).push(sql.to_string());
        Ok(0)
    }

    fn query(&self, sql: &str, _params: &[&str]) -> Result<Vec<Row>> {
        if let Some(err) = self.failure_for(sql) {
            return Err(err);
        }
        Ok(lock(&self.responses).get(sql).cloned().unwrap_or_default())
    }

    fn server_version_string(&self) -> Result<String> {
        Ok(lock(&self.version)
            .clone()
            .unwrap_or_else(|| "8.0.36".to_string()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let row = Row::new(vec![Some("a".into()), None]);
        assert_eq!(row.get_str(0), Some("a"));
        assert_eq!(row.get(1), None);
        assert_eq!(row.get(7), None);
        assert_eq!(row.len(), 2);
        assert!(!row.is_empty());
    }

    #[test]
    fn test_mock_database_unknown_query_is_empty() {
        let db = MockDatabase::new();
        assert!(db.query("SHOW ROLES", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_mock_database_failure_by_prefix() {
        let db = MockDatabase::new();
        db.fail_with("REVOKE", 1141, "There is no such grant defined");

        let err = db.execute("REVOKE SELECT ON *.*.* FROM ROLE 'r'", &[]).unwrap_err();
        assert!(err.is_nonexisting_grant());
        assert!(db.executed().is_empty());

        db.execute("GRANT SELECT ON *.*.* TO ROLE 'r'", &[]).unwrap();
        assert_eq!(db.executed().len(), 1);
    }

    #[test]
    fn test_mock_database_version() {
        let db = MockDatabase::new();
        assert_eq!(db.server_version_string().unwrap(), "8.0.36");
        db.set_version("5.7.25-TiDB-v7.5.0");
        assert_eq!(db.server_version_string().unwrap(), "5.7.25-TiDB-v7.5.0");
    }
}
