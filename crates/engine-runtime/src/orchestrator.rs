use crate::context::{TableClients, TablePlan};
use crate::report::RunResultStore;
use crate::{bulk, incremental};
use engine_core::error::{SyncError, with_retry};
use engine_core::retry::RetryPolicy;
use model::params::SyncParameters;
use model::report::{ErrorKind, TableSyncResult};
use model::table::QualifiedTable;
use planner::reconcile::{ReconcileRequest, reconcile};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// One table's work order, handed to a worker task.
pub struct TableJob {
    pub table: QualifiedTable,
    /// Position in the resolved selection; indexes the start-row vector.
    pub index: usize,
    pub params: Arc<SyncParameters>,
    pub policy: Arc<RetryPolicy>,
    pub cancel: CancellationToken,
    pub store: Arc<RunResultStore>,
}

/// Which path a table takes, decided from the flags and its PK.
#[derive(Debug, PartialEq, Eq)]
pub enum PathDecision {
    Incremental { deep_compare: bool },
    Refresh,
    Skip(String),
}

pub fn decide(params: &SyncParameters, pk_is_empty: bool) -> PathDecision {
    if params.clear_target {
        return PathDecision::Refresh;
    }
    if pk_is_empty {
        if !params.allow_no_pk {
            return PathDecision::Skip(
                "table has no primary key; rerun with --allow-no-pk --deep-compare".into(),
            );
        }
        if !params.deep_compare {
            return PathDecision::Skip(
                "table has no primary key and --deep-compare is not set".into(),
            );
        }
        return PathDecision::Incremental { deep_compare: true };
    }
    PathDecision::Incremental {
        deep_compare: params.deep_compare,
    }
}

/// Runs one table end to end and records its result. Errors never
/// escape: every terminal outcome lands in the run result, and the
/// coordinator tallies from there.
pub async fn sync_table(job: &TableJob, clients: &mut TableClients) {
    let mut result = TableSyncResult::new(job.table.to_string());
    result.start_row_offset = job.params.start_row_for(job.index);
    result.mark_running();
    job.store.update_table(result.clone()).await;

    info!(table = %job.table, "starting table sync");
    match run_table(job, clients, &mut result).await {
        Ok(()) => info!(
            table = %job.table,
            status = ?result.status,
            inserted = result.inserted,
            skipped = result.skipped,
            "table finished"
        ),
        Err(err) => {
            error!(table = %job.table, "table failed: {err}");
            record_failure(&mut result, err);
        }
    }

    job.store.update_table(result).await;
}

async fn run_table(
    job: &TableJob,
    clients: &mut TableClients,
    result: &mut TableSyncResult,
) -> Result<(), SyncError> {
    let table = &job.table;
    let policy = job.policy.as_ref();

    let source_columns = with_retry(policy, clients, move |c| {
        let table = table.clone();
        Box::pin(async move { c.source.columns(&table).await })
    })
    .await?;
    let target_columns = with_retry(policy, clients, move |c| {
        let table = table.clone();
        Box::pin(async move { c.target.columns(&table).await })
    })
    .await?;
    let primary_key = with_retry(policy, clients, move |c| {
        let table = table.clone();
        Box::pin(async move { c.source.primary_key_columns(&table).await })
    })
    .await?;

    result.source_count = with_retry(policy, clients, move |c| {
        let table = table.clone();
        Box::pin(async move { c.source.row_count(&table).await })
    })
    .await?;
    result.target_count = with_retry(policy, clients, move |c| {
        let table = table.clone();
        Box::pin(async move { c.target.row_count(&table).await })
    })
    .await?;

    let (projection, drift) = reconcile(&ReconcileRequest {
        table,
        source_columns: &source_columns,
        target_columns: &target_columns,
        primary_key: &primary_key,
        mapping: job.params.column_mappings.for_table(&table.key()),
        ignores: &job.params.ignore_columns,
        target_columns_only: job.params.target_columns_only,
    })?;
    if !drift.is_empty() {
        result.schema_errors = Some(drift);
    }

    let decision = decide(&job.params, primary_key.is_empty());
    let deep_compare = match &decision {
        PathDecision::Skip(reason) => {
            result.skip(reason.clone());
            return Ok(());
        }
        PathDecision::Incremental { deep_compare } => *deep_compare,
        PathDecision::Refresh => false,
    };

    let identity_insert = target_columns
        .iter()
        .any(|c| c.is_identity && projection.contains_target(&c.name));
    let order_by = incremental::order_columns(&projection, job.params.order_by_pk);
    let plan = TablePlan {
        table: table.clone(),
        projection,
        deep_compare,
        identity_insert,
        source_count: result.source_count,
        batch_size: job.params.batch_size,
        order_by,
    };

    match decision {
        PathDecision::Refresh => {
            bulk::run(clients, &plan, policy, &job.cancel, result).await?
        }
        _ => incremental::run(clients, &plan, policy, &job.cancel, result).await?,
    }

    result.complete();
    Ok(())
}

fn record_failure(result: &mut TableSyncResult, err: SyncError) {
    match &err {
        SyncError::Cancelled => {
            result.skip("run cancelled before completion");
        }
        SyncError::Structural(db) => {
            result.skip(format!("structural conflict, table left as-is: {db}"));
        }
        SyncError::Database(db) if db.is_schema_change() => {
            let drift = result
                .schema_errors
                .get_or_insert_with(Default::default);
            drift.schema_mismatch_details = Some(db.to_string());
            result.fail(
                ErrorKind::Schema,
                format!("schema change during bulk copy: {db}"),
                None,
            );
        }
        _ => {
            let kind = err.kind();
            if kind == ErrorKind::Schema {
                result
                    .schema_errors
                    .get_or_insert_with(Default::default)
                    .schema_mismatch_details = Some(err.to_string());
            }
            let details = format!("{err:?}");
            result.fail(kind, err.to_string(), Some(details));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::sql::error::DbError;

    fn params(
        clear_target: bool,
        allow_no_pk: bool,
        deep_compare: bool,
    ) -> SyncParameters {
        SyncParameters {
            clear_target,
            allow_no_pk,
            deep_compare,
            ..Default::default()
        }
    }

    #[test]
    fn clear_target_always_chooses_refresh() {
        assert_eq!(decide(&params(true, false, false), true), PathDecision::Refresh);
        assert_eq!(decide(&params(true, true, true), false), PathDecision::Refresh);
    }

    #[test]
    fn empty_pk_policy_matrix() {
        assert!(matches!(
            decide(&params(false, false, false), true),
            PathDecision::Skip(_)
        ));
        assert!(matches!(
            decide(&params(false, true, false), true),
            PathDecision::Skip(_)
        ));
        assert_eq!(
            decide(&params(false, true, true), true),
            PathDecision::Incremental { deep_compare: true }
        );
    }

    #[test]
    fn tables_with_a_pk_run_incrementally() {
        assert_eq!(
            decide(&params(false, false, false), false),
            PathDecision::Incremental {
                deep_compare: false
            }
        );
    }

    #[test]
    fn only_bulk_structural_errors_record_a_skip() {
        let mut result = TableSyncResult::new("dbo.History");
        result.mark_running();
        record_failure(
            &mut result,
            SyncError::Structural(DbError::Write("cannot delete from history table".into())),
        );
        assert_eq!(result.status, model::report::TableStatus::Skipped);

        // The same FK-shaped failure outside the bulk path is an
        // ordinary failed table, not a skip.
        let mut result = TableSyncResult::new("dbo.Lines");
        result.mark_running();
        record_failure(
            &mut result,
            SyncError::Database(DbError::Write(
                "conflicted with the FOREIGN KEY constraint, column 'OId'".into(),
            )),
        );
        assert_eq!(result.status, model::report::TableStatus::Failed);
        assert_eq!(result.error_type, Some(ErrorKind::Schema));

        let mut result = TableSyncResult::new("dbo.Users");
        result.mark_running();
        record_failure(&mut result, SyncError::Cancelled);
        assert_eq!(result.status, model::report::TableStatus::Skipped);
    }

    #[test]
    fn schema_errors_stamp_the_drift_record() {
        let mut result = TableSyncResult::new("dbo.Users");
        result.mark_running();
        record_failure(
            &mut result,
            SyncError::Database(DbError::Write("invalid column name 'Email'".into())),
        );

        assert_eq!(result.status, model::report::TableStatus::Failed);
        assert_eq!(result.error_type, Some(ErrorKind::Schema));
        let drift = result.schema_errors.unwrap();
        assert!(drift.schema_mismatch_details.unwrap().contains("invalid column"));
    }
}
