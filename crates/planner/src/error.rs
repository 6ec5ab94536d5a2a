use thiserror::Error;

/// Errors raised while planning a run or reconciling a table schema.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A source primary-key column has no representative in the target
    /// projection, directly or via mapping.
    #[error("primary key column '{column}' of {table} is not representable in the target")]
    PkNotRepresentable { table: String, column: String },

    /// The effective projection ended up empty.
    #[error("no common columns between source and target for {0}")]
    EmptyProjection(String),
}
