use crate::error::PlanError;
use model::column::ColumnMetadata;
use model::mapping::{IgnoreSets, NameMap};
use model::projection::{Projection, ProjectionEntry};
use model::report::SchemaDriftRecord;
use model::table::QualifiedTable;

/// Inputs for reconciling one table's schemas.
pub struct ReconcileRequest<'a> {
    pub table: &'a QualifiedTable,
    pub source_columns: &'a [ColumnMetadata],
    pub target_columns: &'a [ColumnMetadata],
    pub primary_key: &'a [String],
    pub mapping: Option<&'a NameMap>,
    pub ignores: &'a IgnoreSets,
    pub target_columns_only: bool,
}

/// Builds the effective projection and the advisory drift record.
///
/// Source columns are walked in ordinal order; ignored columns drop out
/// first, then each remaining column is renamed through the mapping and
/// kept only when the target actually has a writable column of that
/// name. Computed and generated-always columns never participate.
pub fn reconcile(request: &ReconcileRequest<'_>) -> Result<(Projection, SchemaDriftRecord), PlanError> {
    let table_key = request.table.key();
    let mut drift = SchemaDriftRecord::default();
    let mut projection = Projection::default();

    for column in request.source_columns {
        if !column.is_writable() {
            drift.excluded_columns.push(column.name.clone());
        }
    }
    for column in request.target_columns {
        if !column.is_writable() && !contains(&drift.excluded_columns, &column.name) {
            drift.excluded_columns.push(column.name.clone());
        }
    }

    let writable_targets: Vec<&ColumnMetadata> = request
        .target_columns
        .iter()
        .filter(|c| c.is_writable())
        .collect();

    for column in request.source_columns.iter().filter(|c| c.is_writable()) {
        if request.ignores.is_ignored(&table_key, &column.name) {
            if !contains(&drift.excluded_columns, &column.name) {
                drift.excluded_columns.push(column.name.clone());
            }
            continue;
        }

        let wanted = match request.mapping {
            Some(map) => map.resolve(&column.name),
            None => column.name.clone(),
        };

        let target = writable_targets
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(&wanted));

        match target {
            Some(target) if !projection.contains_target(&target.name) => {
                drift.common_columns.push(target.name.clone());
                projection.entries.push(ProjectionEntry {
                    // Keep the target catalog's casing for rendering.
                    target: target.name.clone(),
                    source: column.name.clone(),
                });
            }
            Some(_) => {
                // A previous source column already claimed this target.
                drift.missing_columns_in_target.push(column.name.clone());
            }
            None => {
                drift.missing_columns_in_target.push(column.name.clone());
            }
        }
    }

    if request.target_columns_only {
        projection
            .entries
            .retain(|e| writable_targets.iter().any(|t| t.name.eq_ignore_ascii_case(&e.target)));
    }

    for target in &writable_targets {
        if !projection.contains_target(&target.name) {
            drift.missing_columns_in_source.push(target.name.clone());
        }
    }

    if projection.entries.is_empty() {
        return Err(PlanError::EmptyProjection(request.table.to_string()));
    }

    for pk_column in request.primary_key {
        let entry = projection
            .entries
            .iter()
            .find(|e| e.source.eq_ignore_ascii_case(pk_column));
        match entry {
            Some(entry) => {
                projection.pk_source.push(entry.source.clone());
                projection.pk_target.push(entry.target.clone());
            }
            None => {
                return Err(PlanError::PkNotRepresentable {
                    table: request.table.to_string(),
                    column: pk_column.clone(),
                });
            }
        }
    }

    Ok((projection, drift))
}

fn contains(list: &[String], name: &str) -> bool {
    list.iter().any(|c| c.eq_ignore_ascii_case(name))
}
