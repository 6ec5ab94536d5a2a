use crate::error::CliError;
use connectors::conn_str;
use connectors::sql::client::MssqlClient;
use engine_core::error::with_retry;
use engine_core::retry::RetryPolicy;
use model::column::ColumnMetadata;
use planner::selection::TableSelection;

/// Read-only comparison mode: row counts on both sides plus column-set
/// differences, per selected table. No writes are issued.
pub async fn run(
    source_conn: &str,
    target_conn: &str,
    selection: &TableSelection,
) -> Result<(), CliError> {
    let source_conn = conn_str::prepare_source(source_conn);
    let target_conn = conn_str::prepare_target(target_conn);
    let policy = RetryPolicy::for_database();

    let mut source = MssqlClient::connect(&source_conn).await?;
    let mut target = MssqlClient::connect(&target_conn).await?;

    let source_tables = with_retry(&policy, &mut source, |c| Box::pin(c.list_base_tables())).await?;
    let target_tables = with_retry(&policy, &mut target, |c| Box::pin(c.list_base_tables())).await?;
    let resolved = selection.resolve(&source_tables, &target_tables);

    println!(
        "{:<40} {:>14} {:>14}  {}",
        "Table", "Source rows", "Target rows", "Schema differences"
    );
    println!("{}", "-".repeat(100));

    for table in &resolved {
        let source_count = with_retry(&policy, &mut source, move |c| {
            let table = table.clone();
            Box::pin(async move { c.row_count(&table).await })
        })
        .await?;
        let target_count = with_retry(&policy, &mut target, move |c| {
            let table = table.clone();
            Box::pin(async move { c.row_count(&table).await })
        })
        .await?;
        let source_columns = with_retry(&policy, &mut source, move |c| {
            let table = table.clone();
            Box::pin(async move { c.columns(&table).await })
        })
        .await?;
        let target_columns = with_retry(&policy, &mut target, move |c| {
            let table = table.clone();
            Box::pin(async move { c.columns(&table).await })
        })
        .await?;

        let missing_in_target = column_diff(&source_columns, &target_columns);
        let missing_in_source = column_diff(&target_columns, &source_columns);

        let mut notes = Vec::new();
        if source_count != target_count {
            notes.push("row counts differ".to_string());
        }
        if !missing_in_target.is_empty() {
            notes.push(format!("missing in target: {}", missing_in_target.join(", ")));
        }
        if !missing_in_source.is_empty() {
            notes.push(format!("missing in source: {}", missing_in_source.join(", ")));
        }
        let notes = if notes.is_empty() {
            "ok".to_string()
        } else {
            notes.join("; ")
        };

        println!(
            "{:<40} {:>14} {:>14}  {}",
            table.to_string(),
            source_count,
            target_count,
            notes
        );
    }

    let source_only: Vec<String> = source_tables
        .iter()
        .filter(|t| selection.matches(t) && !target_tables.contains(t))
        .map(|t| t.to_string())
        .collect();
    if !source_only.is_empty() {
        println!("Tables only in source: {}", source_only.join(", "));
    }

    Ok(())
}

fn column_diff(from: &[ColumnMetadata], against: &[ColumnMetadata]) -> Vec<String> {
    from.iter()
        .filter(|c| c.is_writable())
        .filter(|c| {
            !against
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&c.name))
        })
        .map(|c| c.name.clone())
        .collect()
}
