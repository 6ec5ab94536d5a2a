use crate::sql::client::MssqlClient;
use crate::sql::error::DbError;
use crate::sql::query;
use model::column::ColumnMetadata;
use model::table::QualifiedTable;

/// An enabled foreign key between two tables; `child` references
/// `parent`.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub child: QualifiedTable,
    pub parent: QualifiedTable,
}

const LIST_BASE_TABLES: &str = "SELECT TABLE_SCHEMA, TABLE_NAME \
     FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_TYPE = 'BASE TABLE' \
     ORDER BY TABLE_SCHEMA, TABLE_NAME";

const LIST_COLUMNS: &str = "SELECT c.name, c.column_id, c.is_identity, c.is_computed, c.generated_always_type \
     FROM sys.columns c \
     JOIN sys.tables t ON c.object_id = t.object_id \
     JOIN sys.schemas s ON t.schema_id = s.schema_id \
     WHERE s.name = @P1 AND t.name = @P2 \
     ORDER BY c.column_id";

const LIST_PK_COLUMNS: &str = "SELECT kcu.COLUMN_NAME \
     FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
     JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
       ON kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
      AND kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA \
     WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY' \
       AND kcu.TABLE_SCHEMA = @P1 AND kcu.TABLE_NAME = @P2 \
     ORDER BY kcu.ORDINAL_POSITION";

const TEMPORAL_HISTORY_OF_BASE: &str = "SELECT hs.name, h.name \
     FROM sys.tables t \
     JOIN sys.schemas s ON t.schema_id = s.schema_id \
     JOIN sys.tables h ON t.history_table_id = h.object_id \
     JOIN sys.schemas hs ON h.schema_id = hs.schema_id \
     WHERE s.name = @P1 AND t.name = @P2 AND t.temporal_type = 2";

const TEMPORAL_BASE_OF_HISTORY: &str = "SELECT s.name, t.name \
     FROM sys.tables t \
     JOIN sys.schemas s ON t.schema_id = s.schema_id \
     JOIN sys.tables h ON t.history_table_id = h.object_id \
     JOIN sys.schemas hs ON h.schema_id = hs.schema_id \
     WHERE hs.name = @P1 AND h.name = @P2";

const LIST_FOREIGN_KEYS: &str = "SELECT cs.name, ct.name, ps.name, pt.name \
     FROM sys.foreign_keys fk \
     JOIN sys.tables ct ON fk.parent_object_id = ct.object_id \
     JOIN sys.schemas cs ON ct.schema_id = cs.schema_id \
     JOIN sys.tables pt ON fk.referenced_object_id = pt.object_id \
     JOIN sys.schemas ps ON pt.schema_id = ps.schema_id \
     WHERE fk.is_disabled = 0";

impl MssqlClient {
    /// Every base table in the database, catalog order.
    pub async fn list_base_tables(&mut self) -> Result<Vec<QualifiedTable>, DbError> {
        let rows = self.query(LIST_BASE_TABLES).await?;
        rows.iter()
            .map(|row| {
                let schema = required_str(row, 0, "TABLE_SCHEMA")?;
                let name = required_str(row, 1, "TABLE_NAME")?;
                Ok(QualifiedTable::new(schema, name))
            })
            .collect()
    }

    /// All columns of a table in ordinal order, with identity and
    /// computed/generated flags.
    pub async fn columns(
        &mut self,
        table: &QualifiedTable,
    ) -> Result<Vec<ColumnMetadata>, DbError> {
        let rows = self
            .query_params(LIST_COLUMNS, &[&table.schema, &table.name])
            .await?;

        rows.iter()
            .map(|row| {
                let name = required_str(row, 0, "column name")?;
                let ordinal: i32 = row.try_get(1)?.unwrap_or(0);
                let is_identity: bool = row.try_get(2)?.unwrap_or(false);
                let is_computed: bool = row.try_get(3)?.unwrap_or(false);
                let generated: u8 = row.try_get(4)?.unwrap_or(0);
                Ok(ColumnMetadata {
                    name,
                    ordinal,
                    is_identity,
                    is_computed,
                    is_generated_always: generated != 0,
                })
            })
            .collect()
    }

    /// Primary-key column names in ordinal order; empty when the table
    /// has no PK constraint.
    pub async fn primary_key_columns(
        &mut self,
        table: &QualifiedTable,
    ) -> Result<Vec<String>, DbError> {
        let rows = self
            .query_params(
                LIST_PK_COLUMNS,
                &[&table.schema, &table.name],
            )
            .await?;
        rows.iter()
            .map(|row| required_str(row, 0, "COLUMN_NAME"))
            .collect()
    }

    pub async fn has_identity(&mut self, table: &QualifiedTable) -> Result<bool, DbError> {
        Ok(self.columns(table).await?.iter().any(|c| c.is_identity))
    }

    /// History-table partner when `table` is a system-versioned base.
    pub async fn temporal_history_of(
        &mut self,
        table: &QualifiedTable,
    ) -> Result<Option<QualifiedTable>, DbError> {
        let rows = self
            .query_params(
                TEMPORAL_HISTORY_OF_BASE,
                &[&table.schema, &table.name],
            )
            .await?;
        rows.first()
            .map(|row| {
                let schema = required_str(row, 0, "history schema")?;
                let name = required_str(row, 1, "history name")?;
                Ok(QualifiedTable::new(schema, name))
            })
            .transpose()
    }

    /// Base-table partner when `table` is a temporal history table.
    pub async fn temporal_base_of(
        &mut self,
        table: &QualifiedTable,
    ) -> Result<Option<QualifiedTable>, DbError> {
        let rows = self
            .query_params(
                TEMPORAL_BASE_OF_HISTORY,
                &[&table.schema, &table.name],
            )
            .await?;
        rows.first()
            .map(|row| {
                let schema = required_str(row, 0, "base schema")?;
                let name = required_str(row, 1, "base name")?;
                Ok(QualifiedTable::new(schema, name))
            })
            .transpose()
    }

    /// Every enabled foreign key in the database as (child, parent).
    pub async fn foreign_keys(&mut self) -> Result<Vec<ForeignKey>, DbError> {
        let rows = self.query(LIST_FOREIGN_KEYS).await?;
        rows.iter()
            .map(|row| {
                let child_schema = required_str(row, 0, "child schema")?;
                let child_name = required_str(row, 1, "child name")?;
                let parent_schema = required_str(row, 2, "parent schema")?;
                let parent_name = required_str(row, 3, "parent name")?;
                Ok(ForeignKey {
                    child: QualifiedTable::new(child_schema, child_name),
                    parent: QualifiedTable::new(parent_schema, parent_name),
                })
            })
            .collect()
    }

    pub async fn row_count(&mut self, table: &QualifiedTable) -> Result<u64, DbError> {
        let count = self.query_i64(&query::count_rows(table)).await?;
        Ok(count.max(0) as u64)
    }
}

fn required_str(row: &tiberius::Row, index: usize, what: &str) -> Result<String, DbError> {
    row.try_get::<&str, _>(index)?
        .map(str::to_string)
        .ok_or_else(|| DbError::UnexpectedResult(format!("NULL {what} in catalog result")))
}
