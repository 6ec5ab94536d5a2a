use crate::context::{TableClients, TablePlan};
use connectors::sql::client::MssqlClient;
use connectors::sql::error::DbError;
use connectors::sql::query;
use engine_core::error::{SyncError, db_disposition};
use engine_core::retry::{RetryError, RetryPolicy};
use model::report::TableSyncResult;
use model::table::QualifiedTable;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The clear-target path: empty the target table, then reload it from
/// the source in page order. After a successful run the target holds
/// exactly the source rows for the effective projection.
///
/// Retry granularity is the whole table; a transient failure restarts
/// from the clear.
pub async fn run(
    clients: &mut TableClients,
    plan: &TablePlan,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    result: &mut TableSyncResult,
) -> Result<(), SyncError> {
    let outcome = policy
        .run(
            clients,
            move |c| {
                let plan = plan.clone();
                let cancel = cancel.clone();
                Box::pin(async move { refresh_table(c, &plan, &cancel).await })
            },
            db_disposition,
        )
        .await
        .map_err(RetryError::into_inner);

    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }

    match outcome {
        Ok(inserted) => {
            result.inserted = inserted;
            result.skipped = 0;
            Ok(())
        }
        // FK (547) and temporal-history (4712) conflicts are structural
        // only on this path, where the target is being cleared.
        Err(err) if err.is_structural() => Err(SyncError::Structural(err)),
        Err(err) => Err(err.into()),
    }
}

async fn refresh_table(
    clients: &mut TableClients,
    plan: &TablePlan,
    cancel: &CancellationToken,
) -> Result<u64, DbError> {
    clear_target(&mut clients.target, &plan.table).await?;

    let create = query::create_staging(&plan.table, &plan.projection);
    let insert = query::insert_all(&plan.table, &plan.projection);
    let identity_on = query::set_identity_insert(&plan.table, true);
    let identity_off = query::set_identity_insert(&plan.table, false);

    let mut inserted = 0u64;
    let mut offset = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(DbError::Write("bulk refresh interrupted by shutdown".into()));
        }

        let select = query::select_batch(
            &plan.table,
            &plan.projection,
            &plan.order_by,
            offset,
            plan.batch_size,
        );
        let rows = clients.source.query(&select).await?;
        let read = rows.len() as u64;
        if read == 0 {
            break;
        }

        let mut tx = clients.target.begin().await?;
        let page_result = async {
            let client = tx.client();
            client.exec(&query::drop_staging()).await?;
            client.exec(&create).await?;
            client.bulk_load(query::STAGING_TABLE, rows).await?;
            if plan.identity_insert {
                client.exec(&identity_on).await?;
            }
            let insert_result = client.exec(&insert).await;
            if plan.identity_insert {
                if let Err(err) = client.exec(&identity_off).await {
                    warn!("failed to reset IDENTITY_INSERT: {err}");
                }
            }
            let copied = insert_result?;
            client.exec(&query::drop_staging()).await?;
            Ok::<u64, DbError>(copied)
        }
        .await;

        match page_result {
            Ok(copied) => {
                tx.commit().await?;
                inserted += copied;
                debug!(table = %plan.table, offset, copied, "bulk page committed");
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("rollback after failed bulk page also failed: {rollback_err}");
                }
                return Err(err);
            }
        }

        if read < plan.batch_size as u64 {
            break;
        }
        offset += plan.batch_size as u64;
    }

    info!(table = %plan.table, inserted, "bulk refresh loaded");
    Ok(inserted)
}

/// Empties the target. TRUNCATE first; when FK references make that
/// impossible, fall back to DELETE between a NOCHECK/CHECK bracket.
async fn clear_target(client: &mut MssqlClient, table: &QualifiedTable) -> Result<(), DbError> {
    match client.exec(&query::truncate_table(table)).await {
        Ok(_) => Ok(()),
        Err(truncate_err) => {
            warn!("TRUNCATE failed on {table}, falling back to DELETE: {truncate_err}");
            client.exec(&query::nocheck_all_constraints(table)).await?;
            let deleted = client.exec(&query::delete_all(table)).await;
            let restored = client.exec(&query::check_all_constraints(table)).await;
            deleted?;
            restored?;
            Ok(())
        }
    }
}
