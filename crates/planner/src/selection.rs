use model::table::QualifiedTable;

/// One token of the table-selection argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionToken {
    /// `all` or `*`: every table present in both databases.
    All,
    /// `schema.table`.
    Qualified(QualifiedTable),
    /// A bare name: matches a full qualified name, a schema name, or
    /// the table of that name in the `dbo` schema.
    Bare(String),
}

/// Parsed comma-separated selection. An empty argument selects all.
#[derive(Debug, Clone)]
pub struct TableSelection {
    tokens: Vec<SelectionToken>,
}

impl TableSelection {
    pub fn parse(input: &str) -> Self {
        let tokens = input
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|token| {
                if token == "*" || token.eq_ignore_ascii_case("all") {
                    SelectionToken::All
                } else if token.contains('.') {
                    SelectionToken::Qualified(QualifiedTable::parse(token))
                } else {
                    SelectionToken::Bare(token.to_string())
                }
            })
            .collect::<Vec<_>>();

        Self { tokens }
    }

    pub fn matches(&self, table: &QualifiedTable) -> bool {
        if self.tokens.is_empty() {
            return true;
        }

        self.tokens.iter().any(|token| match token {
            SelectionToken::All => true,
            SelectionToken::Qualified(selected) => selected == table,
            SelectionToken::Bare(name) => {
                name.eq_ignore_ascii_case(&table.schema)
                    || (table.schema.eq_ignore_ascii_case(QualifiedTable::DEFAULT_SCHEMA)
                        && name.eq_ignore_ascii_case(&table.name))
            }
        })
    }

    /// Candidate tables restricted to this selection, keeping only
    /// those present in both source and target. The result is sorted by
    /// qualified name so positional options (start rows) are stable.
    pub fn resolve(
        &self,
        source_tables: &[QualifiedTable],
        target_tables: &[QualifiedTable],
    ) -> Vec<QualifiedTable> {
        let mut resolved: Vec<QualifiedTable> = source_tables
            .iter()
            .filter(|t| self.matches(t))
            .filter(|t| target_tables.contains(t))
            .cloned()
            .collect();
        resolved.sort_by_key(|t| t.key());
        resolved
    }
}
