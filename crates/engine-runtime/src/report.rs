use chrono::Utc;
use engine_core::error::SyncError;
use model::params::SyncParameters;
use model::report::{RunResult, RunStatus, TableSyncResult};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::error;

/// Owns the run result for the lifetime of a run. All updates from
/// parallel table workers are serialized behind one mutex, and the
/// result file is rewritten in full after each update so a crash
/// leaves the last completed table visible.
pub struct RunResultStore {
    run_id: String,
    path: PathBuf,
    inner: Mutex<RunResult>,
}

impl RunResultStore {
    pub fn create(parameters: SyncParameters) -> Result<Self, SyncError> {
        let output_dir = parameters.output_dir.clone();
        std::fs::create_dir_all(&output_dir)?;

        let result = RunResult::new(parameters);
        let file_name = format!(
            "sync-result-{}.json",
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let path = output_dir.join(file_name);

        persist(&path, &result)?;
        Ok(Self {
            run_id: result.run_id.clone(),
            path,
            inner: Mutex::new(result),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts or overwrites one table's result and writes the file
    /// through. Persistence failures are logged, not propagated; the
    /// in-memory result stays authoritative for the final summary.
    pub async fn update_table(&self, table: TableSyncResult) {
        let mut result = self.inner.lock().await;
        result.upsert_table(table);
        if let Err(err) = persist(&self.path, &result) {
            error!("failed to persist run result to {}: {err}", self.path.display());
        }
    }

    pub async fn add_warning(&self, warning: String) {
        let mut result = self.inner.lock().await;
        result.warnings.push(warning);
        if let Err(err) = persist(&self.path, &result) {
            error!("failed to persist run result to {}: {err}", self.path.display());
        }
    }

    pub async fn finalize(&self, status: RunStatus) -> Result<(), SyncError> {
        let mut result = self.inner.lock().await;
        result.finalize(status);
        persist(&self.path, &result)
    }

    pub async fn snapshot(&self) -> RunResult {
        self.inner.lock().await.clone()
    }
}

fn persist(path: &Path, result: &RunResult) -> Result<(), SyncError> {
    let json = serde_json::to_string_pretty(result)
        .map_err(|err| SyncError::Unexpected(format!("run result serialization: {err}")))?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::report::TableStatus;

    fn store_in(dir: &Path) -> RunResultStore {
        let params = SyncParameters {
            output_dir: dir.to_path_buf(),
            ..Default::default()
        };
        RunResultStore::create(params).unwrap()
    }

    #[tokio::test]
    async fn creates_file_and_writes_through_on_update() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.path().exists());

        let mut table = TableSyncResult::new("dbo.Users");
        table.mark_running();
        table.inserted = 2;
        table.complete();
        store.update_table(table).await;

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["Status"], "Running");
        assert_eq!(json["Tables"][0]["TableName"], "dbo.Users");
        assert_eq!(json["Tables"][0]["Inserted"], 2);
    }

    #[tokio::test]
    async fn updates_overwrite_by_table_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let mut first = TableSyncResult::new("dbo.Users");
        first.mark_running();
        store.update_table(first).await;

        let mut second = TableSyncResult::new("DBO.users");
        second.complete();
        store.update_table(second).await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.tables.len(), 1);
        assert_eq!(snapshot.tables[0].status, TableStatus::Completed);
    }

    #[tokio::test]
    async fn finalize_stamps_status_and_end_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        store.add_warning("could not re-enable a constraint".into()).await;
        store.finalize(RunStatus::Completed).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["Status"], "Completed");
        assert!(json.get("EndTime").is_some());
        assert_eq!(json["Warnings"][0], "could not re-enable a constraint");
    }
}
