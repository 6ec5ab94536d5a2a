use crate::sql::client::MssqlClient;
use crate::sql::error::DbError;

/// Explicit `BEGIN TRAN` scope over a single connection. Must be ended
/// with `commit` or `rollback`; the connection is unusable for new work
/// until then.
pub struct Transaction<'a> {
    client: &'a mut MssqlClient,
}

impl<'a> Transaction<'a> {
    pub(crate) async fn begin(client: &'a mut MssqlClient) -> Result<Self, DbError> {
        client.exec("BEGIN TRAN").await?;
        Ok(Self { client })
    }

    pub fn client(&mut self) -> &mut MssqlClient {
        self.client
    }

    pub async fn commit(self) -> Result<(), DbError> {
        self.client.exec("COMMIT TRAN").await?;
        Ok(())
    }

    /// Best-effort rollback; a rollback failure is reported but the
    /// original error should stay primary at the call site.
    pub async fn rollback(self) -> Result<(), DbError> {
        self.client.exec("IF @@TRANCOUNT > 0 ROLLBACK TRAN").await?;
        Ok(())
    }
}
