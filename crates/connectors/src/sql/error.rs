use thiserror::Error;

/// All errors coming from the database/query layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Any SQL Server driver error.
    #[error("SQL Server error: {0}")]
    Tds(#[from] tiberius::error::Error),

    /// Writing rows to the database failed at the application level.
    #[error("Write error: {0}")]
    Write(String),

    /// A result set did not have the expected shape.
    #[error("Unexpected result shape: {0}")]
    UnexpectedResult(String),
}

/// Errors happening during connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// An invalid connection string was provided.
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// TCP-level connection failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TDS handshake or login failed.
    #[error("SQL Server connection failed: {0}")]
    Tds(#[from] tiberius::error::Error),
}

/// Driver codes SQL Server raises for throttling, failover and brief
/// network interruptions.
pub const TRANSIENT_CODES: [u32; 7] = [40613, 40197, 40501, 10928, 10929, 233, 64];

/// Driver codes for column/object mismatches, NULL violations and FK
/// conflicts.
pub const SCHEMA_CODES: [u32; 5] = [207, 208, 213, 515, 547];

/// Message fragments that identify schema trouble when no code matches.
pub const SCHEMA_MESSAGE_FRAGMENTS: [&str; 6] = [
    "invalid column",
    "invalid object name",
    "column",
    "does not exist",
    "identity_insert",
    "generated always",
];

/// Cannot delete rows from a temporal history table.
pub const TEMPORAL_HISTORY_CODE: u32 = 4712;
/// Foreign-key conflict that survives constraint disable.
pub const FK_CONFLICT_CODE: u32 = 547;
/// Schema changed underneath a bulk copy.
pub const SCHEMA_CHANGE_CODES: [u32; 2] = [213, 4891];

/// How an error should be handled by the retry and reporting layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry in place with backoff.
    Transient,
    /// Never retried; stamps the schema-drift record.
    Schema,
    /// Everything else; fails the table after surfacing once.
    Fatal,
}

impl DbError {
    /// Server error number, when the driver surfaced one.
    pub fn server_code(&self) -> Option<u32> {
        match self {
            DbError::Tds(tiberius::error::Error::Server(token)) => Some(token.code()),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            DbError::Tds(tiberius::error::Error::Io { kind, .. }) => {
                *kind == std::io::ErrorKind::TimedOut
            }
            other => other.to_string().to_lowercase().contains("timeout"),
        }
    }

    pub fn classify(&self) -> ErrorClass {
        if let Some(code) = self.server_code() {
            if TRANSIENT_CODES.contains(&code) {
                return ErrorClass::Transient;
            }
            if SCHEMA_CODES.contains(&code) {
                return ErrorClass::Schema;
            }
        }

        if self.is_timeout() {
            return ErrorClass::Transient;
        }

        let message = self.to_string().to_lowercase();
        if SCHEMA_MESSAGE_FRAGMENTS
            .iter()
            .any(|fragment| message.contains(fragment))
        {
            return ErrorClass::Schema;
        }

        ErrorClass::Fatal
    }

    /// Structural failures under bulk refresh: temporal history writes
    /// and FK conflicts that survive constraint disable. Only the
    /// bulk-refresh path consults this; on other paths these codes keep
    /// their ordinary classification.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.server_code(),
            Some(TEMPORAL_HISTORY_CODE) | Some(FK_CONFLICT_CODE)
        )
    }

    /// Schema-change detection during a bulk copy.
    pub fn is_schema_change(&self) -> bool {
        if let Some(code) = self.server_code() {
            if SCHEMA_CHANGE_CODES.contains(&code) {
                return true;
            }
        }
        self.to_string().to_lowercase().contains("schema change")
    }
}
