//! Server version and dialect detection.

use crate::backend::Database;
use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("valid version regex"));

static TIDB_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TiDB-v(\d+\.\d+(?:\.\d+)?)").expect("valid TiDB version regex"));

/// SQL dialect spoken by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Oracle MySQL (and compatible servers that report a plain version)
    MySql,
    /// MariaDB
    MariaDb,
    /// PingCAP TiDB
    TiDb,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::MySql => write!(f, "MySQL"),
            Dialect::MariaDb => write!(f, "MariaDB"),
            Dialect::TiDb => write!(f, "TiDB"),
        }
    }
}

/// Semantic server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the first `major.minor[.patch]` found in `s`.
    pub fn parse(s: &str) -> Option<Self> {
        let caps = VERSION.captures(s)?;
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse().ok());
        Some(Self::new(num(1)?, num(2)?, num(3).unwrap_or(0)))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// What the connected server reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Product version; for TiDB this is the TiDB release, not the MySQL
    /// compatibility version
    pub version: ServerVersion,
    pub dialect: Dialect,
    /// The raw `VERSION()` string
    pub raw: String,
}

impl ServerInfo {
    /// Interpret a `VERSION()` string.
    ///
    /// ```
    /// use grantkit::server::{Dialect, ServerInfo, ServerVersion};
    ///
    /// let info = ServerInfo::parse("8.0.11-TiDB-v7.5.1").unwrap();
    /// assert_eq!(info.dialect, Dialect::TiDb);
    /// assert_eq!(info.version, ServerVersion::new(7, 5, 1));
    /// ```
    pub fn parse(raw: &str) -> Result<Self> {
        let unparsable = || Error::validation(format!("unrecognized server version '{raw}'"));

        let (dialect, version) = if let Some(caps) = TIDB_VERSION.captures(raw) {
            let version = ServerVersion::parse(&caps[1]).ok_or_else(unparsable)?;
            (Dialect::TiDb, version)
        } else if raw.contains("MariaDB") {
            (Dialect::MariaDb, ServerVersion::parse(raw).ok_or_else(unparsable)?)
        } else {
            (Dialect::MySql, ServerVersion::parse(raw).ok_or_else(unparsable)?)
        };

        Ok(Self {
            version,
            dialect,
            raw: raw.to_string(),
        })
    }

    /// Ask the server.
    pub fn detect(db: &dyn Database) -> Result<Self> {
        let raw = db.server_version_string()?;
        log::debug!("Server reports version {raw}");
        Self::parse(&raw)
    }

    pub fn is_tidb(&self) -> bool {
        self.dialect == Dialect::TiDb
    }

    /// Whether the product version is at least `version`.
    pub fn at_least(&self, version: ServerVersion) -> bool {
        self.version >= version
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.dialect, self.version)
    }
}
