use connectors::sql::client::MssqlClient;
use engine_core::error::SyncError;
use model::projection::Projection;
use model::table::QualifiedTable;

/// The pair of connections a table worker owns for the duration of its
/// table. Connections are never shared between workers.
pub struct TableClients {
    pub source: MssqlClient,
    pub target: MssqlClient,
}

impl TableClients {
    /// Opens both sides. The connection strings are expected to have
    /// been prepared already (read-only intent, connect timeout).
    pub async fn connect(source_conn: &str, target_conn: &str) -> Result<Self, SyncError> {
        let source = MssqlClient::connect(source_conn).await?;
        let target = MssqlClient::connect(target_conn).await?;
        Ok(Self { source, target })
    }
}

/// Everything a sync path needs to know about one table, assembled by
/// the orchestrator after probing and reconciliation.
#[derive(Clone)]
pub struct TablePlan {
    pub table: QualifiedTable,
    pub projection: Projection,
    /// Match on the whole projection instead of the PK.
    pub deep_compare: bool,
    /// The target has an identity column that the projection writes.
    pub identity_insert: bool,
    pub source_count: u64,
    pub batch_size: usize,
    /// Source-space ORDER BY columns for deterministic paging.
    pub order_by: Vec<String>,
}
