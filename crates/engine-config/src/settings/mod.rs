use crate::settings::error::SettingsError;
use model::params::SyncParameters;
use model::table::QualifiedTable;
use std::path::PathBuf;
use tracing::warn;

pub mod error;

/// Raw option values as they arrive from the command line.
#[derive(Debug, Clone, Default)]
pub struct RawSettings {
    pub batch_size: Option<usize>,
    pub threads: Option<usize>,
    pub allow_no_pk: bool,
    pub deep_compare: bool,
    pub clear_target: bool,
    pub target_columns_only: bool,
    pub map_columns: Vec<String>,
    pub ignore_columns: Vec<String>,
    pub start_rows: Option<String>,
    pub order_by_pk: bool,
    pub output_dir: Option<PathBuf>,
}

/// Validates and assembles the engine parameter bundle.
pub fn build(raw: RawSettings) -> Result<SyncParameters, SettingsError> {
    let mut params = SyncParameters::default();

    if let Some(batch_size) = raw.batch_size {
        if batch_size == 0 {
            return Err(SettingsError::ZeroBatchSize);
        }
        params.batch_size = batch_size;
    }
    if let Some(threads) = raw.threads {
        if threads == 0 {
            return Err(SettingsError::ZeroThreads);
        }
        params.thread_count = threads;
    }

    if raw.deep_compare && !raw.allow_no_pk {
        return Err(SettingsError::DeepCompareWithoutAllowNoPk);
    }
    params.allow_no_pk = raw.allow_no_pk;
    params.deep_compare = raw.deep_compare;
    params.clear_target = raw.clear_target;
    params.target_columns_only = raw.target_columns_only;
    params.order_by_pk = raw.order_by_pk;

    for spec in &raw.map_columns {
        let (table_key, source, target) = parse_mapping(spec)?;
        params.column_mappings.add(&table_key, &source, &target);
    }

    for spec in &raw.ignore_columns {
        match parse_ignore(spec)? {
            (Some(table_key), column) => params.ignore_columns.add(&table_key, &column),
            (None, column) => params.ignore_columns.add_global(&column),
        }
    }

    if let Some(start_rows) = &raw.start_rows {
        params.start_row_offsets = parse_start_rows(start_rows)?;
        if params.start_row_offsets.iter().any(|&offset| offset > 0) && !raw.order_by_pk {
            warn!(
                "--start-row given without --order-by-pk; paging order may differ between runs"
            );
        }
    }

    if let Some(output_dir) = raw.output_dir {
        params.output_dir = output_dir;
    }

    Ok(params)
}

/// `schema.table.src=tgt` or `table.src=tgt` (table lands in `dbo`).
fn parse_mapping(spec: &str) -> Result<(String, String, String), SettingsError> {
    let (lhs, target) = spec
        .split_once('=')
        .ok_or_else(|| SettingsError::InvalidMapping(spec.to_string()))?;
    let target = target.trim();
    if target.is_empty() {
        return Err(SettingsError::InvalidMapping(spec.to_string()));
    }

    let parts: Vec<&str> = lhs.trim().split('.').collect();
    let (table, source) = match parts.as_slice() {
        [schema, table, source] => (QualifiedTable::new(*schema, *table), *source),
        [table, source] => (QualifiedTable::parse(table), *source),
        _ => return Err(SettingsError::InvalidMapping(spec.to_string())),
    };
    if source.is_empty() {
        return Err(SettingsError::InvalidMapping(spec.to_string()));
    }

    Ok((table.key(), source.to_string(), target.to_string()))
}

/// `schema.table.col`, `table.col`, or a bare `col` (global).
fn parse_ignore(spec: &str) -> Result<(Option<String>, String), SettingsError> {
    let parts: Vec<&str> = spec.trim().split('.').collect();
    match parts.as_slice() {
        [schema, table, column] if !column.is_empty() => Ok((
            Some(QualifiedTable::new(*schema, *table).key()),
            column.to_string(),
        )),
        [table, column] if !column.is_empty() => {
            Ok((Some(QualifiedTable::parse(table).key()), column.to_string()))
        }
        [column] if !column.is_empty() => Ok((None, column.to_string())),
        _ => Err(SettingsError::InvalidIgnore(spec.to_string())),
    }
}

fn parse_start_rows(spec: &str) -> Result<Vec<u64>, SettingsError> {
    spec.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|token| {
            token
                .parse::<u64>()
                .map_err(|_| SettingsError::InvalidStartRow(spec.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let params = build(RawSettings::default()).unwrap();
        assert_eq!(params.batch_size, model::params::DEFAULT_BATCH_SIZE);
        assert_eq!(params.thread_count, model::params::DEFAULT_THREAD_COUNT);
        assert!(!params.clear_target);
    }

    #[test]
    fn mapping_specs_parse_both_shapes() {
        let raw = RawSettings {
            map_columns: vec![
                "dbo.U.Id=UserId".to_string(),
                "U.FullName=DisplayName".to_string(),
            ],
            ..Default::default()
        };
        let params = build(raw).unwrap();

        let map = params.column_mappings.for_table("dbo.u").unwrap();
        assert_eq!(map.resolve("id"), "UserId");
        assert_eq!(map.resolve("FULLNAME"), "DisplayName");
    }

    #[test]
    fn ignore_specs_parse_all_three_shapes() {
        let raw = RawSettings {
            ignore_columns: vec![
                "Secret".to_string(),
                "dbo.Users.Internal".to_string(),
                "Orders.Draft".to_string(),
            ],
            ..Default::default()
        };
        let params = build(raw).unwrap();

        assert!(params.ignore_columns.is_ignored("any.table", "secret"));
        assert!(params.ignore_columns.is_ignored("dbo.users", "Internal"));
        assert!(params.ignore_columns.is_ignored("dbo.orders", "draft"));
        assert!(!params.ignore_columns.is_ignored("dbo.users", "draft"));
    }

    #[test]
    fn start_rows_parse_positionally() {
        let raw = RawSettings {
            start_rows: Some("0, 9000000,5".to_string()),
            ..Default::default()
        };
        let params = build(raw).unwrap();
        assert_eq!(params.start_row_offsets, vec![0, 9_000_000, 5]);
        assert_eq!(params.start_row_for(1), 9_000_000);
        assert_eq!(params.start_row_for(7), 0);
    }

    #[test]
    fn invalid_specs_are_rejected() {
        assert!(matches!(
            build(RawSettings {
                map_columns: vec!["no-equals".into()],
                ..Default::default()
            }),
            Err(SettingsError::InvalidMapping(_))
        ));
        assert!(matches!(
            build(RawSettings {
                start_rows: Some("1,two".into()),
                ..Default::default()
            }),
            Err(SettingsError::InvalidStartRow(_))
        ));
        assert!(matches!(
            build(RawSettings {
                batch_size: Some(0),
                ..Default::default()
            }),
            Err(SettingsError::ZeroBatchSize)
        ));
    }

    #[test]
    fn deep_compare_requires_allow_no_pk() {
        let raw = RawSettings {
            deep_compare: true,
            ..Default::default()
        };
        assert!(matches!(
            build(raw),
            Err(SettingsError::DeepCompareWithoutAllowNoPk)
        ));

        let raw = RawSettings {
            deep_compare: true,
            allow_no_pk: true,
            ..Default::default()
        };
        assert!(build(raw).is_ok());
    }
}
