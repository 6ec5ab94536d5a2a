use crate::retry::{RetryDisposition, RetryError, RetryPolicy};
use connectors::sql::error::{ConnectorError, DbError, ErrorClass};
use futures::future::BoxFuture;
use model::report::ErrorKind;
use planner::error::PlanError;
use thiserror::Error;

/// Top-level errors for the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Connection setup failed.
    #[error("Connection error: {0}")]
    Connector(#[from] ConnectorError),

    /// Database error that survived the retry policy.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// FK or temporal-history conflict hit while clearing under bulk
    /// refresh. Only the bulk path raises this; the same driver codes
    /// on other paths stay in their ordinary classification.
    #[error("structural conflict under bulk refresh: {0}")]
    Structural(DbError),

    /// Planning or schema reconciliation failed.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// A worker task was cancelled or panicked.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Writing the run-result file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A shutdown request interrupted the run.
    #[error("shutdown requested")]
    Cancelled,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl SyncError {
    /// The taxonomy bucket recorded in the run result.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Database(db) => match db.classify() {
                ErrorClass::Transient => ErrorKind::Transient,
                ErrorClass::Schema => ErrorKind::Schema,
                ErrorClass::Fatal => ErrorKind::Fatal,
            },
            SyncError::Structural(_) => ErrorKind::Structural,
            SyncError::Plan(_) => ErrorKind::Precondition,
            _ => ErrorKind::Fatal,
        }
    }
}

/// Retry disposition for database errors: only transient ones go
/// around again.
pub fn db_disposition(err: &DbError) -> RetryDisposition {
    match err.classify() {
        ErrorClass::Transient => RetryDisposition::Retry,
        _ => RetryDisposition::Stop,
    }
}

/// Runs a database operation through the retry policy, collapsing the
/// retry wrapper back into the final error. `ctx` usually carries the
/// caller's connections; the operation reborrows it per attempt.
pub async fn with_retry<Ctx, F, T>(
    policy: &RetryPolicy,
    ctx: &mut Ctx,
    op: F,
) -> Result<T, DbError>
where
    F: for<'a> FnMut(&'a mut Ctx) -> BoxFuture<'a, Result<T, DbError>>,
{
    policy
        .run(ctx, op, db_disposition)
        .await
        .map_err(RetryError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_errors_map_to_taxonomy_kinds() {
        let schema = SyncError::Database(DbError::Write("invalid column name".into()));
        assert_eq!(schema.kind(), ErrorKind::Schema);

        let transient = SyncError::Database(DbError::Write("lock request timeout".into()));
        assert_eq!(transient.kind(), ErrorKind::Transient);

        let fatal = SyncError::Database(DbError::Write("disk full".into()));
        assert_eq!(fatal.kind(), ErrorKind::Fatal);
    }

    #[test]
    fn plan_errors_are_preconditions() {
        let err = SyncError::Plan(PlanError::EmptyProjection("dbo.T".into()));
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn structural_kind_comes_only_from_the_dedicated_variant() {
        let err = SyncError::Structural(DbError::Write("FK conflict survived NOCHECK".into()));
        assert_eq!(err.kind(), ErrorKind::Structural);

        // The same error text through the ordinary database arm keeps
        // its ordinary classification.
        let err = SyncError::Database(DbError::Write("FK conflict survived NOCHECK".into()));
        assert_ne!(err.kind(), ErrorKind::Structural);
    }

    #[tokio::test]
    async fn with_retry_stops_on_schema_errors() {
        let policy = RetryPolicy::new(4, std::time::Duration::ZERO, std::time::Duration::ZERO);
        let mut calls = 0usize;

        let result: Result<(), DbError> = with_retry(&policy, &mut calls, |count| {
            Box::pin(async move {
                *count += 1;
                Err(DbError::Write("invalid object name 'dbo.Missing'".into()))
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
