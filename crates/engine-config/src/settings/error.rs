use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid column mapping '{0}', expected schema.table.src=tgt or table.src=tgt")]
    InvalidMapping(String),

    #[error("invalid ignore column '{0}', expected schema.table.col, table.col or col")]
    InvalidIgnore(String),

    #[error("invalid start row '{0}', expected a comma list of non-negative integers")]
    InvalidStartRow(String),

    #[error("batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("thread count must be greater than zero")]
    ZeroThreads,

    #[error("--deep-compare requires --allow-no-pk")]
    DeepCompareWithoutAllowNoPk,
}
