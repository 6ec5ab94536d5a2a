use model::report::{RunResult, TableStatus};
use std::path::Path;

/// Per-table console summary printed after a run.
pub fn print_summary(result: &RunResult, result_path: &Path) {
    println!();
    println!(
        "{:<40} {:<10} {:>12} {:>12} {:>10}",
        "Table", "Status", "Inserted", "Skipped", "Seconds"
    );
    println!("{}", "-".repeat(90));

    let mut completed = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;
    for table in &result.tables {
        match table.status {
            TableStatus::Completed => completed += 1,
            TableStatus::Failed => failed += 1,
            TableStatus::Skipped => skipped += 1,
            _ => {}
        }

        println!(
            "{:<40} {:<10} {:>12} {:>12} {:>10.2}",
            table.table_name,
            format!("{:?}", table.status),
            table.inserted,
            table.skipped,
            table.duration_seconds
        );
        if let Some(message) = &table.error_message {
            println!("    {message}");
        }
    }

    println!("{}", "-".repeat(90));
    println!(
        "{} completed, {} failed, {} skipped ({} tables total)",
        completed,
        failed,
        skipped,
        result.tables.len()
    );
    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    println!("Run result: {}", result_path.display());
}
