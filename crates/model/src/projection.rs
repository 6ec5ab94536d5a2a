/// One column the sync touches: the target column it writes and the
/// source column it is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionEntry {
    pub target: String,
    pub source: String,
}

/// The ordered list of target columns a table sync writes, plus the
/// primary key rendered in both source and target space. Every target
/// name is unique (case-insensitive) and exists in the target table.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub entries: Vec<ProjectionEntry>,
    /// Source-space PK columns in ordinal order; empty when the table
    /// has no primary key.
    pub pk_source: Vec<String>,
    /// The same PK columns translated to target space.
    pub pk_target: Vec<String>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn target_columns(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.target.as_str()).collect()
    }

    pub fn source_for_target(&self, target: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.target.eq_ignore_ascii_case(target))
            .map(|e| e.source.as_str())
    }

    pub fn contains_target(&self, target: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.target.eq_ignore_ascii_case(target))
    }

    /// Target-space columns the anti-join matches on: the PK, or the
    /// whole projection under deep compare.
    pub fn key_columns(&self, deep_compare: bool) -> Vec<&str> {
        if deep_compare || self.pk_target.is_empty() {
            self.target_columns()
        } else {
            self.pk_target.iter().map(String::as_str).collect()
        }
    }
}
