use connectors::sql::client::MssqlClient;
use connectors::sql::query;
use engine_core::error::{SyncError, with_retry};
use engine_core::retry::RetryPolicy;
use model::table::QualifiedTable;
use tracing::{info, warn};

/// Scoped suspension of FK checking and system versioning around a
/// bulk-refresh run.
///
/// FK checking is dropped on every base table in the target, not only
/// the selected ones, because selected tables can be children of
/// unselected parents. System versioning is dropped for temporal base
/// tables in the selection and for the base partner of any selected
/// history table. Individual statement failures are collected as
/// warnings; `release` must be called on every exit path.
pub struct Warden {
    fk_tables: Vec<QualifiedTable>,
    temporal_pairs: Vec<(QualifiedTable, QualifiedTable)>,
    pub warnings: Vec<String>,
}

impl Warden {
    pub async fn engage(
        client: &mut MssqlClient,
        selection: &[QualifiedTable],
        policy: &RetryPolicy,
    ) -> Result<Self, SyncError> {
        let fk_tables = with_retry(policy, client, |c| Box::pin(c.list_base_tables())).await?;
        let mut warnings = Vec::new();

        info!("disabling foreign keys on {} tables", fk_tables.len());
        for table in &fk_tables {
            if let Err(err) = client.exec(&query::nocheck_all_constraints(table)).await {
                warnings.push(format!("failed to disable constraints on {table}: {err}"));
            }
        }

        let temporal_pairs = Self::temporal_pairs(client, selection, policy).await?;
        for (base, history) in &temporal_pairs {
            info!("suspending system versioning on {base} (history {history})");
            if let Err(err) = client.exec(&query::system_versioning_off(base)).await {
                warnings.push(format!("failed to suspend system versioning on {base}: {err}"));
            }
        }

        for warning in &warnings {
            warn!("{warning}");
        }

        Ok(Self {
            fk_tables,
            temporal_pairs,
            warnings,
        })
    }

    async fn temporal_pairs(
        client: &mut MssqlClient,
        selection: &[QualifiedTable],
        policy: &RetryPolicy,
    ) -> Result<Vec<(QualifiedTable, QualifiedTable)>, SyncError> {
        let mut pairs: Vec<(QualifiedTable, QualifiedTable)> = Vec::new();

        for table in selection {
            let history = with_retry(policy, client, move |c| {
                let table = table.clone();
                Box::pin(async move { c.temporal_history_of(&table).await })
            })
            .await?;
            let pair = match history {
                Some(history) => Some((table.clone(), history)),
                None => {
                    // A selected history table drags its base along.
                    with_retry(policy, client, move |c| {
                        let table = table.clone();
                        Box::pin(async move { c.temporal_base_of(&table).await })
                    })
                    .await?
                    .map(|base| (base, table.clone()))
                }
            };

            if let Some((base, history)) = pair {
                if !pairs.iter().any(|(b, _)| b == &base) {
                    pairs.push((base, history));
                }
            }
        }

        Ok(pairs)
    }

    /// Restores system versioning and FK checking. Never fails; every
    /// problem is collected as a warning so the caller can still
    /// finalize the run report.
    pub async fn release(&mut self, client: &mut MssqlClient) {
        for (base, history) in &self.temporal_pairs {
            info!("restoring system versioning on {base}");
            if let Err(err) = client
                .exec(&query::system_versioning_on(base, history))
                .await
            {
                let warning =
                    format!("failed to restore system versioning on {base}: {err}");
                warn!("{warning}");
                self.warnings.push(warning);
            }
        }

        info!("re-enabling foreign keys on {} tables", self.fk_tables.len());
        for table in &self.fk_tables {
            if let Err(err) = client.exec(&query::check_all_constraints(table)).await {
                let warning = format!("failed to re-enable constraints on {table}: {err}");
                warn!("{warning}");
                self.warnings.push(warning);
            }
        }
    }
}
