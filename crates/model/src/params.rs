use crate::mapping::{ColumnMappings, IgnoreSets};
use serde::Serialize;
use std::path::PathBuf;

pub const DEFAULT_BATCH_SIZE: usize = 100_000;
pub const DEFAULT_THREAD_COUNT: usize = 4;

/// The full configuration bundle consumed by the sync engine. Echoed
/// verbatim into the run-result file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SyncParameters {
    pub batch_size: usize,
    pub thread_count: usize,
    pub allow_no_pk: bool,
    pub deep_compare: bool,
    pub clear_target: bool,
    pub target_columns_only: bool,
    pub column_mappings: ColumnMappings,
    pub ignore_columns: IgnoreSets,
    pub start_row_offsets: Vec<u64>,
    pub order_by_pk: bool,
    pub output_dir: PathBuf,
}

impl Default for SyncParameters {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            thread_count: DEFAULT_THREAD_COUNT,
            allow_no_pk: false,
            deep_compare: false,
            clear_target: false,
            target_columns_only: false,
            column_mappings: ColumnMappings::default(),
            ignore_columns: IgnoreSets::default(),
            start_row_offsets: Vec::new(),
            order_by_pk: false,
            output_dir: PathBuf::from("."),
        }
    }
}

impl SyncParameters {
    /// Start-row offset for the table at `index` in the resolved
    /// selection; tables beyond the configured vector start at zero.
    pub fn start_row_for(&self, index: usize) -> u64 {
        self.start_row_offsets.get(index).copied().unwrap_or(0)
    }
}
