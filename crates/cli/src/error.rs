use connectors::sql::error::{ConnectorError, DbError};
use engine_config::settings::error::SettingsError;
use engine_core::error::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(
        "missing connection info: pass source/target host and database positionals, \
         or --source-conn and --target-conn"
    )]
    MissingConnectionInfo,

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Connection error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SIGINT/SIGTERM ended the run early.
    #[error("shutdown requested")]
    ShutdownRequested,
}
