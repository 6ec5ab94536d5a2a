use model::projection::Projection;
use model::table::{QualifiedTable, quote_ident};

/// Session-private staging table the batch loop materializes into.
pub const STAGING_TABLE: &str = "#sync_stage";

fn bracket(name: &str) -> String {
    format!("[{}]", quote_ident(name))
}

fn select_list(projection: &Projection) -> String {
    projection
        .entries
        .iter()
        .map(|e| {
            if e.source.eq_ignore_ascii_case(&e.target) {
                bracket(&e.source)
            } else {
                format!("{} AS {}", bracket(&e.source), bracket(&e.target))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| bracket(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Paged source read. `order_by` carries source-space column names; a
/// deterministic order is required for cross-batch disjointness.
pub fn select_batch(
    source: &QualifiedTable,
    projection: &Projection,
    order_by: &[String],
    offset: u64,
    fetch: usize,
) -> String {
    let order = order_by
        .iter()
        .map(|c| bracket(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM {} ORDER BY {} OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
        select_list(projection),
        source.bracketed(),
        order,
        offset,
        fetch
    )
}

/// Clones the projection's column structure from the target into the
/// staging table, empty.
pub fn create_staging(target: &QualifiedTable, projection: &Projection) -> String {
    format!(
        "SELECT TOP (0) {} INTO {} FROM {}",
        column_list(&projection.target_columns()),
        STAGING_TABLE,
        target.bracketed()
    )
}

pub fn drop_staging() -> String {
    format!("DROP TABLE IF EXISTS {STAGING_TABLE}")
}

/// The anti-join insert: rows from staging whose key is absent from the
/// target. `key_columns` are target-space names. The null-safe form
/// compares with INTERSECT so NULL key positions match each other.
pub fn insert_missing(
    target: &QualifiedTable,
    projection: &Projection,
    key_columns: &[&str],
    null_safe: bool,
) -> String {
    let columns = column_list(&projection.target_columns());
    let staged = projection
        .target_columns()
        .iter()
        .map(|c| format!("s.{}", bracket(c)))
        .collect::<Vec<_>>()
        .join(", ");

    let presence = if null_safe {
        let s_keys = key_columns
            .iter()
            .map(|c| format!("s.{}", bracket(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let t_keys = key_columns
            .iter()
            .map(|c| format!("t.{}", bracket(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("EXISTS (SELECT {s_keys} INTERSECT SELECT {t_keys})")
    } else {
        key_columns
            .iter()
            .map(|c| format!("t.{col} = s.{col}", col = bracket(c)))
            .collect::<Vec<_>>()
            .join(" AND ")
    };

    format!(
        "INSERT INTO {target} ({columns}) SELECT {staged} FROM {STAGING_TABLE} AS s \
         WHERE NOT EXISTS (SELECT 1 FROM {target} AS t WHERE {presence})",
        target = target.bracketed(),
    )
}

/// Unconditional insert from staging, used by the bulk-refresh path
/// after the target was cleared.
pub fn insert_all(target: &QualifiedTable, projection: &Projection) -> String {
    let columns = column_list(&projection.target_columns());
    format!(
        "INSERT INTO {target} ({columns}) SELECT {columns} FROM {STAGING_TABLE}",
        target = target.bracketed(),
    )
}

pub fn set_identity_insert(target: &QualifiedTable, on: bool) -> String {
    format!(
        "SET IDENTITY_INSERT {} {}",
        target.bracketed(),
        if on { "ON" } else { "OFF" }
    )
}

pub fn count_rows(table: &QualifiedTable) -> String {
    format!("SELECT COUNT_BIG(*) FROM {}", table.bracketed())
}

pub fn truncate_table(table: &QualifiedTable) -> String {
    format!("TRUNCATE TABLE {}", table.bracketed())
}

pub fn delete_all(table: &QualifiedTable) -> String {
    format!("DELETE FROM {}", table.bracketed())
}

pub fn nocheck_all_constraints(table: &QualifiedTable) -> String {
    format!("ALTER TABLE {} NOCHECK CONSTRAINT ALL", table.bracketed())
}

pub fn check_all_constraints(table: &QualifiedTable) -> String {
    format!(
        "ALTER TABLE {} WITH CHECK CHECK CONSTRAINT ALL",
        table.bracketed()
    )
}

pub fn system_versioning_off(base: &QualifiedTable) -> String {
    format!(
        "ALTER TABLE {} SET (SYSTEM_VERSIONING = OFF)",
        base.bracketed()
    )
}

pub fn system_versioning_on(base: &QualifiedTable, history: &QualifiedTable) -> String {
    format!(
        "ALTER TABLE {} SET (SYSTEM_VERSIONING = ON (HISTORY_TABLE = {}, DATA_CONSISTENCY_CHECK = OFF))",
        base.bracketed(),
        history.bracketed()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::projection::ProjectionEntry;

    fn projection(pairs: &[(&str, &str)]) -> Projection {
        Projection {
            entries: pairs
                .iter()
                .map(|(source, target)| ProjectionEntry {
                    source: source.to_string(),
                    target: target.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn batch_select_aliases_renamed_columns_only() {
        let source = QualifiedTable::new("dbo", "U");
        let proj = projection(&[("Id", "UserId"), ("FullName", "DisplayName"), ("Age", "Age")]);

        let sql = select_batch(&source, &proj, &["Id".to_string()], 200, 100);
        assert_eq!(
            sql,
            "SELECT [Id] AS [UserId], [FullName] AS [DisplayName], [Age] \
             FROM [dbo].[U] ORDER BY [Id] OFFSET 200 ROWS FETCH NEXT 100 ROWS ONLY"
        );
    }

    #[test]
    fn staging_clones_projection_columns_from_target() {
        let target = QualifiedTable::new("dbo", "Users");
        let proj = projection(&[("Id", "Id"), ("Name", "Name")]);

        assert_eq!(
            create_staging(&target, &proj),
            "SELECT TOP (0) [Id], [Name] INTO #sync_stage FROM [dbo].[Users]"
        );
    }

    #[test]
    fn anti_join_matches_on_pk_equality() {
        let target = QualifiedTable::new("dbo", "Users");
        let proj = projection(&[("Id", "Id"), ("Name", "Name")]);

        let sql = insert_missing(&target, &proj, &["Id"], false);
        assert_eq!(
            sql,
            "INSERT INTO [dbo].[Users] ([Id], [Name]) \
             SELECT s.[Id], s.[Name] FROM #sync_stage AS s \
             WHERE NOT EXISTS (SELECT 1 FROM [dbo].[Users] AS t WHERE t.[Id] = s.[Id])"
        );
    }

    #[test]
    fn deep_compare_uses_null_safe_intersect() {
        let target = QualifiedTable::new("dbo", "Events");
        let proj = projection(&[("k", "k"), ("v", "v")]);

        let sql = insert_missing(&target, &proj, &["k", "v"], true);
        assert!(sql.contains(
            "WHERE EXISTS (SELECT s.[k], s.[v] INTERSECT SELECT t.[k], t.[v])"
        ));
    }

    #[test]
    fn warden_statements_render_bracket_quoted() {
        let table = QualifiedTable::new("dbo", "Orders");
        let history = QualifiedTable::new("dbo", "OrdersHistory");

        assert_eq!(
            nocheck_all_constraints(&table),
            "ALTER TABLE [dbo].[Orders] NOCHECK CONSTRAINT ALL"
        );
        assert_eq!(
            check_all_constraints(&table),
            "ALTER TABLE [dbo].[Orders] WITH CHECK CHECK CONSTRAINT ALL"
        );
        assert_eq!(
            system_versioning_on(&table, &history),
            "ALTER TABLE [dbo].[Orders] SET (SYSTEM_VERSIONING = ON \
             (HISTORY_TABLE = [dbo].[OrdersHistory], DATA_CONSISTENCY_CHECK = OFF))"
        );
    }

    #[test]
    fn identity_insert_brackets_both_directions() {
        let table = QualifiedTable::new("dbo", "Users");
        assert_eq!(
            set_identity_insert(&table, true),
            "SET IDENTITY_INSERT [dbo].[Users] ON"
        );
        assert_eq!(
            set_identity_insert(&table, false),
            "SET IDENTITY_INSERT [dbo].[Users] OFF"
        );
    }
}
