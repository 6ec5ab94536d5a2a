use crate::context::TableClients;
use crate::orchestrator::{self, TableJob};
use crate::report::RunResultStore;
use crate::warden::Warden;
use connectors::conn_str;
use connectors::sql::client::MssqlClient;
use engine_core::error::{SyncError, with_retry};
use engine_core::retry::RetryPolicy;
use model::params::SyncParameters;
use model::report::{RunResult, RunStatus, TableSyncResult};
use model::table::QualifiedTable;
use planner::graph::DependencyGraph;
use planner::selection::TableSelection;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Inputs for one synchronization run.
pub struct SyncRequest {
    pub source_conn: String,
    pub target_conn: String,
    pub selection: TableSelection,
    pub params: SyncParameters,
}

/// What the caller gets back after the run finalized.
pub struct RunSummary {
    pub result: RunResult,
    pub result_path: PathBuf,
    pub cancelled: bool,
}

/// Drives a whole run: plan levels, fan tables out to bounded workers
/// level by level, and keep the run result persisted throughout. Only
/// planner and warden failures propagate; per-table outcomes live in
/// the run result.
pub async fn run(request: SyncRequest, cancel: CancellationToken) -> Result<RunSummary, SyncError> {
    let source_conn = conn_str::prepare_source(&request.source_conn);
    let target_conn = conn_str::prepare_target(&request.target_conn);
    let policy = Arc::new(RetryPolicy::for_database());

    let mut source = MssqlClient::connect(&source_conn).await?;
    let mut target = MssqlClient::connect(&target_conn).await?;

    let store = Arc::new(RunResultStore::create(request.params.clone())?);
    info!(
        run_id = store.run_id(),
        "run result file: {}",
        store.path().display()
    );

    let plan = match plan_levels(&mut source, &mut target, &request.selection, &policy).await {
        Ok(plan) => plan,
        Err(err) => {
            let _ = store.finalize(RunStatus::Failed).await;
            return Err(err);
        }
    };
    info!(
        tables = plan.resolved.len(),
        levels = plan.levels.len(),
        "execution plan ready"
    );

    let params = Arc::new(request.params);
    let mut warden = if params.clear_target {
        match Warden::engage(&mut target, &plan.resolved, &policy).await {
            Ok(warden) => Some(warden),
            Err(err) => {
                let _ = store.finalize(RunStatus::Failed).await;
                return Err(err);
            }
        }
    } else {
        None
    };

    let dispatch = Dispatch {
        source_conn,
        target_conn,
        params,
        policy,
        store: store.clone(),
        cancel,
    };
    let levels_outcome = run_levels(&dispatch, &plan).await;

    // The release block runs no matter how the levels ended.
    if let Some(warden) = warden.as_mut() {
        warden.release(&mut target).await;
        for warning in warden.warnings.drain(..) {
            store.add_warning(warning).await;
        }
    }

    store.finalize(RunStatus::Completed).await?;

    let cancelled = matches!(levels_outcome, Err(SyncError::Cancelled));
    if let Err(err) = levels_outcome {
        if !cancelled {
            return Err(err);
        }
    }

    Ok(RunSummary {
        result: store.snapshot().await,
        result_path: store.path().to_path_buf(),
        cancelled,
    })
}

struct ExecutionPlan {
    resolved: Vec<QualifiedTable>,
    levels: Vec<Vec<QualifiedTable>>,
    /// Table key -> position in the resolved selection, for the
    /// positional start-row vector.
    index_of: HashMap<String, usize>,
}

async fn plan_levels(
    source: &mut MssqlClient,
    target: &mut MssqlClient,
    selection: &TableSelection,
    policy: &RetryPolicy,
) -> Result<ExecutionPlan, SyncError> {
    let source_tables = with_retry(policy, source, |c| Box::pin(c.list_base_tables())).await?;
    let target_tables = with_retry(policy, target, |c| Box::pin(c.list_base_tables())).await?;
    let resolved = selection.resolve(&source_tables, &target_tables);

    let foreign_keys = with_retry(policy, target, |c| Box::pin(c.foreign_keys())).await?;
    let edges: Vec<(QualifiedTable, QualifiedTable)> = foreign_keys
        .into_iter()
        .map(|fk| (fk.child, fk.parent))
        .collect();
    let levels = DependencyGraph::build(&resolved, &edges).execution_levels();

    let index_of = resolved
        .iter()
        .enumerate()
        .map(|(index, table)| (table.key(), index))
        .collect();

    Ok(ExecutionPlan {
        resolved,
        levels,
        index_of,
    })
}

struct Dispatch {
    source_conn: String,
    target_conn: String,
    params: Arc<SyncParameters>,
    policy: Arc<RetryPolicy>,
    store: Arc<RunResultStore>,
    cancel: CancellationToken,
}

/// Levels run strictly in sequence; tables within a level fan out to
/// worker tasks, at most `thread_count` in flight.
async fn run_levels(dispatch: &Dispatch, plan: &ExecutionPlan) -> Result<(), SyncError> {
    for (level_index, level) in plan.levels.iter().enumerate() {
        if dispatch.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        info!(
            level = level_index + 1,
            of = plan.levels.len(),
            tables = level.len(),
            "dispatching level"
        );
        let semaphore = Arc::new(Semaphore::new(dispatch.params.thread_count));
        let mut workers = JoinSet::new();

        for table in level {
            let job = TableJob {
                table: table.clone(),
                index: plan.index_of.get(&table.key()).copied().unwrap_or(0),
                params: dispatch.params.clone(),
                policy: dispatch.policy.clone(),
                cancel: dispatch.cancel.clone(),
                store: dispatch.store.clone(),
            };
            let semaphore = semaphore.clone();
            let source_conn = dispatch.source_conn.clone();
            let target_conn = dispatch.target_conn.clone();

            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                if job.cancel.is_cancelled() {
                    return;
                }

                match TableClients::connect(&source_conn, &target_conn).await {
                    Ok(mut clients) => orchestrator::sync_table(&job, &mut clients).await,
                    Err(err) => {
                        error!(table = %job.table, "could not open connections: {err}");
                        let mut result = TableSyncResult::new(job.table.to_string());
                        result.mark_running();
                        result.fail(err.kind(), err.to_string(), None);
                        job.store.update_table(result).await;
                    }
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(join_err) = joined {
                error!("table worker panicked or was aborted: {join_err}");
            }
        }
    }

    if dispatch.cancel.is_cancelled() {
        Err(SyncError::Cancelled)
    } else {
        Ok(())
    }
}
