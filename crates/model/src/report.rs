use crate::params::SyncParameters;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Terminal and in-flight states of a single table sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TableStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Error taxonomy recorded in the run result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Transient,
    Schema,
    Precondition,
    Structural,
    Fatal,
}

/// Advisory record of how the source and target schemas differ for one
/// table after mapping and ignores are applied.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaDriftRecord {
    pub missing_columns_in_target: Vec<String>,
    pub missing_columns_in_source: Vec<String>,
    pub excluded_columns: Vec<String>,
    pub common_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_mismatch_details: Option<String>,
}

impl SchemaDriftRecord {
    pub fn is_empty(&self) -> bool {
        self.missing_columns_in_target.is_empty()
            && self.missing_columns_in_source.is_empty()
            && self.excluded_columns.is_empty()
            && self.schema_mismatch_details.is_none()
    }
}

/// Outcome of one table within a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableSyncResult {
    pub table_name: String,
    pub status: TableStatus,
    pub source_count: u64,
    pub target_count: u64,
    pub inserted: u64,
    pub skipped: u64,
    pub start_row_offset: u64,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_errors: Option<SchemaDriftRecord>,
}

impl TableSyncResult {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            status: TableStatus::Pending,
            source_count: 0,
            target_count: 0,
            inserted: 0,
            skipped: 0,
            start_row_offset: 0,
            start_time: Utc::now(),
            end_time: None,
            duration_seconds: 0.0,
            error_message: None,
            error_type: None,
            error_details: None,
            schema_errors: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = TableStatus::Running;
        self.start_time = Utc::now();
    }

    pub fn complete(&mut self) {
        self.status = TableStatus::Completed;
        self.finish();
    }

    pub fn skip(&mut self, reason: impl Into<String>) {
        self.status = TableStatus::Skipped;
        self.error_message = Some(reason.into());
        self.finish();
    }

    pub fn fail(
        &mut self,
        kind: ErrorKind,
        message: impl Into<String>,
        details: Option<String>,
    ) {
        self.status = TableStatus::Failed;
        self.error_type = Some(kind);
        self.error_message = Some(message.into());
        self.error_details = details;
        self.finish();
    }

    fn finish(&mut self) {
        let end = Utc::now();
        self.duration_seconds = (end - self.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.end_time = Some(end);
    }
}

/// Terminal status of the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// The run-level report. Holds at most one table result per qualified
/// name; updates overwrite.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunResult {
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub parameters: SyncParameters,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub tables: Vec<TableSyncResult>,
}

impl RunResult {
    pub fn new(parameters: SyncParameters) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            start_time: Utc::now(),
            end_time: None,
            parameters,
            status: RunStatus::Running,
            warnings: Vec::new(),
            tables: Vec::new(),
        }
    }

    pub fn upsert_table(&mut self, result: TableSyncResult) {
        match self
            .tables
            .iter_mut()
            .find(|t| t.table_name.eq_ignore_ascii_case(&result.table_name))
        {
            Some(existing) => *existing = result,
            None => self.tables.push(result),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableSyncResult> {
        self.tables
            .iter()
            .find(|t| t.table_name.eq_ignore_ascii_case(name))
    }

    pub fn finalize(&mut self, status: RunStatus) {
        self.status = status;
        self.end_time = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_keeps_one_entry_per_table() {
        let mut run = RunResult::new(SyncParameters::default());

        let mut first = TableSyncResult::new("dbo.Users");
        first.mark_running();
        run.upsert_table(first);

        let mut second = TableSyncResult::new("DBO.USERS");
        second.inserted = 42;
        second.complete();
        run.upsert_table(second);

        assert_eq!(run.tables.len(), 1);
        let entry = run.table("dbo.users").unwrap();
        assert_eq!(entry.status, TableStatus::Completed);
        assert_eq!(entry.inserted, 42);
    }

    #[test]
    fn report_serializes_with_pascal_case_fields() {
        let mut run = RunResult::new(SyncParameters::default());
        run.upsert_table(TableSyncResult::new("dbo.Users"));
        run.finalize(RunStatus::Completed);

        let json = serde_json::to_value(&run).unwrap();
        assert!(json.get("RunId").is_some());
        assert!(json.get("StartTime").is_some());
        assert_eq!(json["Status"], "Completed");
        assert_eq!(json["Tables"][0]["TableName"], "dbo.Users");
        assert_eq!(json["Tables"][0]["Status"], "Pending");
    }

    #[test]
    fn failure_records_kind_and_details() {
        let mut result = TableSyncResult::new("dbo.Orders");
        result.mark_running();
        result.fail(
            ErrorKind::Schema,
            "invalid column name 'Email'",
            Some("batch offset 200".into()),
        );

        assert_eq!(result.status, TableStatus::Failed);
        assert_eq!(result.error_type, Some(ErrorKind::Schema));
        assert!(result.end_time.is_some());
    }
}
