use serde::Serialize;

/// A single column as reported by the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub ordinal: i32,
    pub is_identity: bool,
    pub is_computed: bool,
    pub is_generated_always: bool,
}

impl ColumnMetadata {
    /// Computed and generated-always columns can never appear in a
    /// projection; the server owns their values.
    pub fn is_writable(&self) -> bool {
        !self.is_computed && !self.is_generated_always
    }
}

/// Primary key of a table: source column names in ordinal order. May be
/// empty when the table carries no PK constraint.
pub type PrimaryKey = Vec<String>;
