use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A schema-qualified table name. Comparison, hashing and map keys are
/// case-insensitive; the original casing is preserved for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualifiedTable {
    pub schema: String,
    pub name: String,
}

impl QualifiedTable {
    pub const DEFAULT_SCHEMA: &'static str = "dbo";

    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parses `schema.name` or a bare `name` (placed in the `dbo` schema).
    pub fn parse(token: &str) -> Self {
        match token.split_once('.') {
            Some((schema, name)) => Self::new(schema.trim(), name.trim()),
            None => Self::new(Self::DEFAULT_SCHEMA, token.trim()),
        }
    }

    /// Canonical lowercase `schema.name` key for maps and equality.
    pub fn key(&self) -> String {
        format!(
            "{}.{}",
            self.schema.to_lowercase(),
            self.name.to_lowercase()
        )
    }

    /// Bracket-quoted `[schema].[name]` for use in SQL text.
    pub fn bracketed(&self) -> String {
        format!("[{}].[{}]", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

/// Escapes closing brackets so the identifier is safe inside `[...]`.
pub fn quote_ident(ident: &str) -> String {
    ident.replace(']', "]]")
}

impl fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl PartialEq for QualifiedTable {
    fn eq(&self, other: &Self) -> bool {
        self.schema.eq_ignore_ascii_case(&other.schema)
            && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for QualifiedTable {}

impl Hash for QualifiedTable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parse_qualified_and_bare_names() {
        let qualified = QualifiedTable::parse("sales.Orders");
        assert_eq!(qualified.schema, "sales");
        assert_eq!(qualified.name, "Orders");

        let bare = QualifiedTable::parse("Users");
        assert_eq!(bare.schema, "dbo");
        assert_eq!(bare.name, "Users");
    }

    #[test]
    fn equality_is_case_insensitive() {
        let a = QualifiedTable::new("dbo", "Users");
        let b = QualifiedTable::new("DBO", "users");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn renders_bracketed_sql_form() {
        let table = QualifiedTable::new("dbo", "Or]ders");
        assert_eq!(table.bracketed(), "[dbo].[Or]]ders]");
    }
}
