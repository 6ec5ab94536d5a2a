use crate::error::CliError;
use crate::shutdown::{EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_SUCCESS};
use clap::Parser;
use engine_config::settings::{self, RawSettings};
use engine_runtime::coordinator::{self, SyncRequest};
use planner::selection::TableSelection;
use std::path::PathBuf;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod compare;
mod conn;
mod error;
mod output;
mod shutdown;

/// One-way incremental bulk replicator between two SQL Server
/// databases. Inserts every source row missing from the target; never
/// updates or deletes target rows unless --clear-target is given.
#[derive(Parser)]
#[command(name = "tablesync", version, about)]
struct Cli {
    /// Source server hostname.
    source_host: Option<String>,
    /// Source database name.
    source_db: Option<String>,
    /// Target server hostname.
    target_host: Option<String>,
    /// Target database name.
    target_db: Option<String>,
    /// Comma-separated table selection: `all`/`*`, `schema.table`, a
    /// schema name, or a bare table name in dbo. Empty selects all.
    table_selection: Option<String>,

    /// Rows per batch; also the bulk-refresh copy batch size.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Worker count per execution level.
    #[arg(long)]
    threads: Option<usize>,

    /// Full source connection string; overrides host/database.
    #[arg(long)]
    source_conn: Option<String>,

    /// Full target connection string; overrides host/database.
    #[arg(long)]
    target_conn: Option<String>,

    /// Permit syncing tables without a primary key (needs --deep-compare).
    #[arg(long)]
    allow_no_pk: bool,

    /// Match on the full projection instead of the primary key.
    #[arg(long)]
    deep_compare: bool,

    /// Truncate-and-reload instead of incremental insert.
    #[arg(long)]
    clear_target: bool,

    /// Restrict the projection to columns that exist in the target.
    #[arg(long)]
    target_columns_only: bool,

    /// Drop a column from the projection: `schema.table.col`,
    /// `table.col`, or `col` for all tables.
    #[arg(long = "ignore-column")]
    ignore_column: Vec<String>,

    /// Rename a column on the way over: `schema.table.src=tgt` or
    /// `table.src=tgt`.
    #[arg(long = "map-column")]
    map_column: Vec<String>,

    /// Comma list of start-row offsets, one per selected table.
    #[arg(long)]
    start_row: Option<String>,

    /// Page by primary-key order instead of the first projection column.
    #[arg(long)]
    order_by_pk: bool,

    /// Directory for run-result files.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Read-only mode: compare counts and schemas, change nothing.
    #[arg(long)]
    compare_counts_and_schema: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let exit_code = match run_cli().await {
        Ok(()) => EXIT_SUCCESS,
        Err(CliError::ShutdownRequested) => {
            info!("run stopped by shutdown request; progress is in the run-result file");
            EXIT_INTERRUPTED
        }
        Err(err) => {
            tracing::error!("{err}");
            EXIT_FAILURE
        }
    };

    process::exit(exit_code);
}

async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    shutdown::listen_for_shutdown(cancel.clone());

    let source_conn = resolve_conn(&cli.source_conn, &cli.source_host, &cli.source_db)?;
    let target_conn = resolve_conn(&cli.target_conn, &cli.target_host, &cli.target_db)?;
    let selection = TableSelection::parse(cli.table_selection.as_deref().unwrap_or(""));

    if cli.compare_counts_and_schema {
        return compare::run(&source_conn, &target_conn, &selection).await;
    }

    let params = settings::build(RawSettings {
        batch_size: cli.batch_size,
        threads: cli.threads,
        allow_no_pk: cli.allow_no_pk,
        deep_compare: cli.deep_compare,
        clear_target: cli.clear_target,
        target_columns_only: cli.target_columns_only,
        map_columns: cli.map_column,
        ignore_columns: cli.ignore_column,
        start_rows: cli.start_row,
        order_by_pk: cli.order_by_pk,
        output_dir: cli.output_dir,
    })?;

    let summary = coordinator::run(
        SyncRequest {
            source_conn,
            target_conn,
            selection,
            params,
        },
        cancel,
    )
    .await?;

    output::print_summary(&summary.result, &summary.result_path);

    if summary.cancelled {
        return Err(CliError::ShutdownRequested);
    }
    Ok(())
}

/// An explicit connection string wins; otherwise one is built from the
/// host/database positionals.
fn resolve_conn(
    conn: &Option<String>,
    host: &Option<String>,
    database: &Option<String>,
) -> Result<String, CliError> {
    if let Some(conn) = conn {
        return Ok(conn.clone());
    }
    match (host, database) {
        (Some(host), Some(database)) => Ok(conn::build_conn_string(host, database)),
        _ => Err(CliError::MissingConnectionInfo),
    }
}
