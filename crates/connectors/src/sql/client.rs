use crate::sql::error::{ConnectorError, DbError};
use crate::sql::transaction::Transaction;
use tiberius::{Client, Config, ToSql, TokenRow};
pub use tiberius::Row;
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

pub type TdsStream = Compat<TcpStream>;

/// One SQL Server connection. Workers own their clients; a client is
/// never shared across tasks.
pub struct MssqlClient {
    client: Client<TdsStream>,
}

impl MssqlClient {
    pub async fn connect(conn_str: &str) -> Result<Self, ConnectorError> {
        let config = Config::from_ado_string(conn_str)
            .map_err(|e| ConnectorError::InvalidConnectionString(e.to_string()))?;

        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;

        let client = Client::connect(config, tcp.compat_write()).await?;
        Ok(Self { client })
    }

    /// Executes a statement and returns the affected row count.
    pub async fn exec(&mut self, sql: &str) -> Result<u64, DbError> {
        debug!(sql, "exec");
        let result = self.client.execute(sql, &[]).await?;
        Ok(result.total())
    }

    pub async fn query(&mut self, sql: &str) -> Result<Vec<Row>, DbError> {
        debug!(sql, "query");
        let stream = self.client.simple_query(sql).await?;
        Ok(stream.into_first_result().await?)
    }

    pub async fn query_params(
        &mut self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<Row>, DbError> {
        debug!(sql, "query");
        let stream = self.client.query(sql, params).await?;
        Ok(stream.into_first_result().await?)
    }

    /// Runs a single-cell query returning a BIGINT.
    pub async fn query_i64(&mut self, sql: &str) -> Result<i64, DbError> {
        let rows = self.query(sql).await?;
        let row = rows
            .first()
            .ok_or_else(|| DbError::UnexpectedResult(format!("no rows from: {sql}")))?;
        row.try_get::<i64, _>(0)?
            .ok_or_else(|| DbError::UnexpectedResult(format!("NULL scalar from: {sql}")))
    }

    /// Bulk-loads previously fetched rows into `table`. The reader's
    /// column order must match the table's column order exactly.
    pub async fn bulk_load(&mut self, table: &str, rows: Vec<Row>) -> Result<u64, DbError> {
        let mut request = self.client.bulk_insert(table).await?;

        for row in rows {
            let mut token = TokenRow::new();
            for value in row.into_iter() {
                token.push(value);
            }
            request.send(token).await?;
        }

        let result = request.finalize().await?;
        Ok(result.total())
    }

    /// Opens an explicit transaction on this connection.
    pub async fn begin(&mut self) -> Result<Transaction<'_>, DbError> {
        Transaction::begin(self).await
    }
}
