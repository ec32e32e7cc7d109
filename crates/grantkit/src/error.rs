//! Error types for reconciliation operations.
//!
//! Errors are categorized so callers can tell apart conditions that are a
//! user mistake, a conflict with existing server state, or a failure of the
//! database itself. Each variant carries enough context to diagnose the
//! problem without re-running the operation.

use thiserror::Error;

/// Server error code for a grant that does not exist (`ER_NONEXISTING_GRANT`).
pub const ER_NONEXISTING_GRANT: u16 = 1141;
/// Server error code for a table grant that does not exist (`ER_NONEXISTING_TABLE_GRANT`).
pub const ER_NONEXISTING_TABLE_GRANT: u16 = 1147;
/// Server error code for a routine grant that does not exist (`ER_NONEXISTING_PROC_GRANT`).
pub const ER_NONEXISTING_PROC_GRANT: u16 = 1403;
/// Server error code for an unknown database (`ER_BAD_DB_ERROR`).
pub const ER_BAD_DB_ERROR: u16 = 1049;
/// Server error code for an account operation on an unknown user (`ER_CANNOT_USER`).
pub const ER_CANNOT_USER: u16 = 1396;
/// Server error code for a definer or grantee that does not exist (`ER_NO_SUCH_USER`).
pub const ER_NO_SUCH_USER: u16 = 1449;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Declared input is malformed
    Validation,
    /// Server already holds a grant that would be clobbered
    Conflict,
    /// Operation is not possible for this grant kind or server dialect
    Unsupported,
    /// Target is already gone server-side; an internal signal that read and
    /// delete turn into success
    Absent,
    /// Requested object could not be located
    NotFound,
    /// Statement failed on the server
    Database,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether an operation hitting this category can finish as a no-op.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid configuration",
            Self::Conflict => "Conflicting grant",
            Self::Unsupported => "Unsupported operation",
            Self::Absent => "Already absent",
            Self::NotFound => "Not found",
            Self::Database => "Database error",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors that can occur while reconciling server state.
#[derive(Debug, Error)]
pub enum Error {
    /// Declared data failed validation
    #[error("validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// A privilege field returned by the server could not be parsed
    #[error("invalid privilege format: {entry}")]
    MalformedPrivilegeField {
        /// The offending `;`-separated entry
        entry: String,
    },

    /// The grantee already holds a grant on the same target
    #[error("grant {desired} conflicts with existing grant {existing}")]
    GrantAlreadyExists {
        /// Rendering of the grant that was about to be created
        desired: String,
        /// Rendering of the grant found on the server
        existing: String,
    },

    /// Privileges would have to be dropped from a grant kind that cannot do it
    #[error("grant does not support partial privilege revokes: {grant}")]
    PartialRevokeUnsupported {
        /// Rendering of the grant
        grant: String,
    },

    /// Import could not locate a matching grant
    #[error("failed to find the grant to import: {id} ({candidates} grants inspected)")]
    ImportNotFound {
        /// The import identity that was requested
        id: String,
        /// Number of grants the server reported for that grantee
        candidates: usize,
    },

    /// Feature not available on the connected server
    #[error("{feature} requires {requirement} (connected to {server})")]
    Unsupported {
        /// The feature that was requested
        feature: String,
        /// Dialect or minimum version the feature needs
        requirement: String,
        /// Dialect and version of the connected server
        server: String,
    },

    /// Statement failed on the server
    #[error("error running SQL ({statement}): {message}")]
    Database {
        /// The SQL that was attempted
        statement: String,
        /// Server error number, when the server reported one
        code: Option<u16>,
        /// Driver or server message
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Build an error for a feature the connected server lacks.
    pub fn unsupported(
        feature: impl Into<String>,
        requirement: impl Into<String>,
        server: impl std::fmt::Display,
    ) -> Self {
        Error::Unsupported {
            feature: feature.into(),
            requirement: requirement.into(),
            server: server.to_string(),
        }
    }

    /// Build a database error for the given statement.
    pub fn database(
        statement: impl Into<String>,
        code: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Error::Database {
            statement: statement.into(),
            code,
            message: message.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation { .. } | Error::MalformedPrivilegeField { .. } => {
                ErrorCategory::Validation
            }
            Error::GrantAlreadyExists { .. } => ErrorCategory::Conflict,
            Error::PartialRevokeUnsupported { .. } | Error::Unsupported { .. } => {
                ErrorCategory::Unsupported
            }
            Error::ImportNotFound { .. } => ErrorCategory::NotFound,
            Error::Database { .. } if self.is_nonexisting_grant() => ErrorCategory::Absent,
            Error::Database { .. } => ErrorCategory::Database,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Other,
        }
    }

    /// Server error number, if this is a database error that carried one.
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::Database { code, .. } => *code,
            _ => None,
        }
    }

    /// Whether the server reported that the grant (or grantee) does not exist.
    pub fn is_nonexisting_grant(&self) -> bool {
        matches!(
            self.code(),
            Some(ER_NONEXISTING_GRANT | ER_NONEXISTING_TABLE_GRANT | ER_NONEXISTING_PROC_GRANT)
        )
    }

    /// Whether the server reported an unknown database.
    pub fn is_unknown_database(&self) -> bool {
        self.code() == Some(ER_BAD_DB_ERROR)
    }

    /// Whether the server reported that the user account does not exist.
    pub fn is_unknown_user(&self) -> bool {
        matches!(self.code(), Some(ER_CANNOT_USER | ER_NO_SUCH_USER))
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
