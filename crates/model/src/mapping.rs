use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Case-insensitive two-way column rename map for a single table.
/// Keys are lowercased; values keep the caller's casing for rendering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NameMap {
    source_to_target: HashMap<String, String>,
    target_to_source: HashMap<String, String>,
}

impl NameMap {
    pub fn insert(&mut self, source: &str, target: &str) {
        self.source_to_target
            .insert(source.to_lowercase(), target.to_string());
        self.target_to_source
            .insert(target.to_lowercase(), source.to_string());
    }

    /// Target name for a source column; defaults to the column itself.
    pub fn resolve(&self, source: &str) -> String {
        self.source_to_target
            .get(&source.to_lowercase())
            .cloned()
            .unwrap_or_else(|| source.to_string())
    }

    pub fn source_for(&self, target: &str) -> Option<&str> {
        self.target_to_source
            .get(&target.to_lowercase())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.source_to_target.is_empty()
    }
}

/// Per-table column renames keyed by the lowercase qualified table name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ColumnMappings {
    tables: HashMap<String, NameMap>,
}

impl ColumnMappings {
    pub fn add(&mut self, table_key: &str, source: &str, target: &str) {
        self.tables
            .entry(table_key.to_lowercase())
            .or_default()
            .insert(source, target);
    }

    pub fn for_table(&self, table_key: &str) -> Option<&NameMap> {
        self.tables.get(&table_key.to_lowercase())
    }
}

/// Columns excluded from every projection, either for one table or
/// globally. All membership checks are case-insensitive.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IgnoreSets {
    global: HashSet<String>,
    tables: HashMap<String, HashSet<String>>,
}

impl IgnoreSets {
    pub fn add_global(&mut self, column: &str) {
        self.global.insert(column.to_lowercase());
    }

    pub fn add(&mut self, table_key: &str, column: &str) {
        self.tables
            .entry(table_key.to_lowercase())
            .or_default()
            .insert(column.to_lowercase());
    }

    pub fn is_ignored(&self, table_key: &str, column: &str) -> bool {
        let column = column.to_lowercase();
        if self.global.contains(&column) {
            return true;
        }
        self.tables
            .get(&table_key.to_lowercase())
            .is_some_and(|cols| cols.contains(&column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_map_resolves_case_insensitively() {
        let mut map = NameMap::default();
        map.insert("FullName", "DisplayName");

        assert_eq!(map.resolve("fullname"), "DisplayName");
        assert_eq!(map.resolve("Other"), "Other");
        assert_eq!(map.source_for("displayname"), Some("FullName"));
    }

    #[test]
    fn ignore_sets_combine_global_and_per_table() {
        let mut ignores = IgnoreSets::default();
        ignores.add_global("Secret");
        ignores.add("dbo.users", "Internal");

        assert!(ignores.is_ignored("dbo.orders", "SECRET"));
        assert!(ignores.is_ignored("DBO.Users", "internal"));
        assert!(!ignores.is_ignored("dbo.orders", "internal"));
    }
}
