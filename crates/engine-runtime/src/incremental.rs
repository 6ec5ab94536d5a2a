use crate::context::{TableClients, TablePlan};
use connectors::sql::client::{MssqlClient, Row};
use connectors::sql::error::DbError;
use connectors::sql::query;
use engine_core::error::{SyncError, db_disposition};
use engine_core::retry::{RetryError, RetryPolicy};
use model::projection::Projection;
use model::report::TableSyncResult;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The default per-table path: page the source in a deterministic
/// order, stage each page next to the target and insert only the rows
/// whose key is absent. Never touches existing target rows, so reruns
/// are idempotent.
pub async fn run(
    clients: &mut TableClients,
    plan: &TablePlan,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    result: &mut TableSyncResult,
) -> Result<(), SyncError> {
    // Rows below the configured offset are intentionally not attempted.
    result.skipped = result.start_row_offset;
    if result.start_row_offset >= plan.source_count {
        return Ok(());
    }

    let key_columns = plan.projection.key_columns(plan.deep_compare);
    let sql = BatchSql {
        create: query::create_staging(&plan.table, &plan.projection),
        insert: query::insert_missing(
            &plan.table,
            &plan.projection,
            &key_columns,
            plan.deep_compare,
        ),
        identity_on: query::set_identity_insert(&plan.table, true),
        identity_off: query::set_identity_insert(&plan.table, false),
        identity: plan.identity_insert,
    };

    let mut offset = result.start_row_offset;
    while offset < plan.source_count {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let select = query::select_batch(
            &plan.table,
            &plan.projection,
            &plan.order_by,
            offset,
            plan.batch_size,
        );

        let stats = policy
            .run(
                clients,
                {
                    let select = select.clone();
                    let sql = sql.clone();
                    move |c| {
                        let select = select.clone();
                        let sql = sql.clone();
                        Box::pin(async move { run_batch(c, &select, &sql).await })
                    }
                },
                db_disposition,
            )
            .await
            .map_err(RetryError::into_inner)?;

        result.inserted += stats.inserted;
        result.skipped += stats.read.saturating_sub(stats.inserted);
        debug!(
            table = %plan.table,
            offset,
            read = stats.read,
            inserted = stats.inserted,
            "batch committed"
        );

        if stats.read == 0 {
            // The source shrank underneath the paging loop.
            break;
        }
        offset += plan.batch_size as u64;
    }

    Ok(())
}

/// ORDER BY columns for the paging loop, in source space. PK order when
/// requested and available, otherwise the first projection column.
pub fn order_columns(projection: &Projection, order_by_pk: bool) -> Vec<String> {
    if order_by_pk && !projection.pk_source.is_empty() {
        projection.pk_source.clone()
    } else {
        projection
            .entries
            .first()
            .map(|e| vec![e.source.clone()])
            .unwrap_or_default()
    }
}

#[derive(Clone)]
struct BatchSql {
    create: String,
    insert: String,
    identity_on: String,
    identity_off: String,
    identity: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct BatchStats {
    read: u64,
    inserted: u64,
}

/// One batch: read a page from the source, then stage and anti-join
/// insert inside a single target transaction.
async fn run_batch(
    clients: &mut TableClients,
    select: &str,
    sql: &BatchSql,
) -> Result<BatchStats, DbError> {
    let rows = clients.source.query(select).await?;
    let read = rows.len() as u64;
    if read == 0 {
        return Ok(BatchStats { read, inserted: 0 });
    }

    let mut tx = clients.target.begin().await?;
    match stage_and_insert(tx.client(), sql, rows).await {
        Ok(inserted) => {
            tx.commit().await?;
            Ok(BatchStats { read, inserted })
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("rollback after failed batch also failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

async fn stage_and_insert(
    client: &mut MssqlClient,
    sql: &BatchSql,
    rows: Vec<Row>,
) -> Result<u64, DbError> {
    // A leftover staging table from an aborted attempt would make
    // SELECT INTO fail.
    client.exec(&query::drop_staging()).await?;
    client.exec(&sql.create).await?;
    client.bulk_load(query::STAGING_TABLE, rows).await?;

    if sql.identity {
        client.exec(&sql.identity_on).await?;
    }
    let insert_result = client.exec(&sql.insert).await;
    if sql.identity {
        // Always switch identity insert back off, even when the insert
        // failed; the setting is per session, not per transaction.
        if let Err(err) = client.exec(&sql.identity_off).await {
            warn!("failed to reset IDENTITY_INSERT: {err}");
        }
    }
    let inserted = insert_result?;

    client.exec(&query::drop_staging()).await?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::projection::ProjectionEntry;

    fn projection() -> Projection {
        Projection {
            entries: vec![
                ProjectionEntry {
                    source: "Id".into(),
                    target: "Id".into(),
                },
                ProjectionEntry {
                    source: "Name".into(),
                    target: "Name".into(),
                },
            ],
            pk_source: vec!["Id".into()],
            pk_target: vec!["Id".into()],
        }
    }

    #[test]
    fn pk_order_is_used_when_requested() {
        let projection = projection();
        assert_eq!(order_columns(&projection, true), vec!["Id".to_string()]);
    }

    #[test]
    fn first_projection_column_is_the_fallback() {
        let mut projection = projection();
        assert_eq!(order_columns(&projection, false), vec!["Id".to_string()]);

        projection.pk_source.clear();
        projection.pk_target.clear();
        assert_eq!(order_columns(&projection, true), vec!["Id".to_string()]);
    }
}
