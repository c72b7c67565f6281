//! Statement compilation: fixtures plus resolved column types become ordered
//! lists of parameterized SQL statement specifications.
//!
//! ## Ordering
//!
//! Insert statements follow declaration order exactly, table by table and row
//! by row. Delete statements are the flat reverse of that walk, so tables are
//! deleted child-before-parent and rows within a table are deleted
//! last-inserted-first. The compiler never reorders on its own; foreign-key
//! ordering is expressed purely through declaration order, parents first.
//!
//! ## Type resolution
//!
//! Each parameter is typed by the first match of: explicit per-column
//! override, scanned schema type (lower-cased lookup), then
//! [`ColumnType::Default`]. Table names are matched exactly.

use itertools::Itertools;

use crate::csv::{CsvParser, CsvRow};
use crate::data::ColumnType;
use crate::error::FixtureError;
use crate::fixture::{
    CsvDataSetFixture, CsvTableFixture, DataSetFixture, TableFixture, override_for,
};
use crate::schema::{TypesByColumn, TypesByTable};

/// How fixture rows are removed during cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CleanupStrategy {
    /// Delete precisely the declared rows, matched by their id columns.
    #[default]
    MatchedRows,
    /// Delete every row of each declared table.
    AllRows,
}

/// One compiled statement: SQL text with positional placeholders plus its
/// ordered parameters, each still textual and paired with its resolved type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementSpec {
    pub sql: String,
    pub params: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub value: Option<String>,
    pub col_type: ColumnType,
}

/// Compiles the INSERT statements for a structured data set, one per row, in
/// declaration order.
pub fn insert_specs(
    data_set: &DataSetFixture,
    types: &TypesByTable,
) -> Result<Vec<StatementSpec>, FixtureError> {
    let mut specs = Vec::new();
    for table in &data_set.tables {
        let scanned = scanned_types(types, &table.name)?;
        for row in &table.rows {
            let names: Vec<&str> = row.columns.iter().map(|c| c.name.as_str()).collect();
            let params = row
                .columns
                .iter()
                .map(|c| Parameter {
                    value: c.value.clone(),
                    col_type: resolve_type(table, scanned, &c.name),
                })
                .collect();
            specs.push(StatementSpec {
                sql: insert_sql(&table.name, &names),
                params,
            });
        }
    }
    Ok(specs)
}

/// Compiles the DELETE statements for a structured data set.
///
/// The list is the flat reverse of the insert walk. Under
/// [`CleanupStrategy::AllRows`] each table contributes exactly one statement
/// regardless of row count.
pub fn delete_specs(
    data_set: &DataSetFixture,
    types: &TypesByTable,
    strategy: CleanupStrategy,
) -> Result<Vec<StatementSpec>, FixtureError> {
    let mut specs = Vec::new();
    for table in &data_set.tables {
        match strategy {
            CleanupStrategy::MatchedRows => {
                let scanned = scanned_types(types, &table.name)?;
                for row in &table.rows {
                    specs.push(matched_row_delete(table, scanned, row)?);
                }
            }
            CleanupStrategy::AllRows => specs.push(delete_all_spec(&table.name)),
        }
    }
    specs.reverse();
    Ok(specs)
}

/// Compiles the INSERT statements for a CSV data set, one per parsed row, in
/// declaration order with columns in header order.
pub fn csv_insert_specs(
    data_set: &CsvDataSetFixture,
    types: &TypesByTable,
) -> Result<Vec<StatementSpec>, FixtureError> {
    let parser = CsvParser::new(data_set.null_token.clone());
    let mut specs = Vec::new();
    for table in &data_set.tables {
        let scanned = scanned_types(types, &table.name)?;
        for row in parser.parse(&table.text())? {
            let names: Vec<&str> = row.iter().map(|(name, _)| name.as_str()).collect();
            let sql = insert_sql(&table.name, &names);
            let params = csv_parameters(table, scanned, row);
            specs.push(StatementSpec { sql, params });
        }
    }
    Ok(specs)
}

/// Compiles the DELETE statements for a CSV data set; same ordering contract
/// as [`delete_specs`].
pub fn csv_delete_specs(
    data_set: &CsvDataSetFixture,
    types: &TypesByTable,
    strategy: CleanupStrategy,
) -> Result<Vec<StatementSpec>, FixtureError> {
    let parser = CsvParser::new(data_set.null_token.clone());
    let mut specs = Vec::new();
    for table in &data_set.tables {
        match strategy {
            CleanupStrategy::MatchedRows => {
                let scanned = scanned_types(types, &table.name)?;
                for row in parser.parse(&table.text())? {
                    specs.push(csv_matched_row_delete(table, scanned, row)?);
                }
            }
            CleanupStrategy::AllRows => specs.push(delete_all_spec(&table.name)),
        }
    }
    specs.reverse();
    Ok(specs)
}

fn scanned_types<'a>(
    types: &'a TypesByTable,
    table: &str,
) -> Result<&'a TypesByColumn, FixtureError> {
    types
        .get(table)
        .ok_or_else(|| FixtureError::unresolved_table(table))
}

fn resolve_type(table: &TableFixture, scanned: &TypesByColumn, column: &str) -> ColumnType {
    override_for(&table.type_overrides, column)
        .or_else(|| scanned.get(&column.to_lowercase()).copied())
        .unwrap_or(ColumnType::Default)
}

fn csv_resolve_type(table: &CsvTableFixture, scanned: &TypesByColumn, column: &str) -> ColumnType {
    override_for(&table.type_overrides, column)
        .or_else(|| scanned.get(&column.to_lowercase()).copied())
        .unwrap_or(ColumnType::Default)
}

fn insert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders = columns.iter().map(|_| "?").join(", ");
    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        columns.iter().join(", ")
    )
}

fn delete_all_spec(table: &str) -> StatementSpec {
    StatementSpec {
        sql: format!("DELETE FROM {table}"),
        params: Vec::new(),
    }
}

fn matched_row_delete(
    table: &TableFixture,
    scanned: &TypesByColumn,
    row: &crate::fixture::RowFixture,
) -> Result<StatementSpec, FixtureError> {
    let ids: Vec<_> = row.columns.iter().filter(|c| c.is_id).collect();
    if ids.is_empty() {
        return Err(FixtureError::Declaration(format!(
            "at least one id column is required per row of table '{}'",
            table.name
        )));
    }
    for id in &ids {
        if id.value.is_none() {
            return Err(FixtureError::Declaration(format!(
                "id column '{}' of table '{}' holds a null value",
                id.name, table.name
            )));
        }
    }
    let conditions = ids.iter().map(|c| format!("{} = ?", c.name)).join(" AND ");
    let params = ids
        .iter()
        .map(|c| Parameter {
            value: c.value.clone(),
            col_type: resolve_type(table, scanned, &c.name),
        })
        .collect();
    Ok(StatementSpec {
        sql: format!("DELETE FROM {} WHERE {conditions}", table.name),
        params,
    })
}

fn csv_matched_row_delete(
    table: &CsvTableFixture,
    scanned: &TypesByColumn,
    row: CsvRow,
) -> Result<StatementSpec, FixtureError> {
    if table.id_columns.is_empty() {
        return Err(FixtureError::Declaration(format!(
            "at least one id column is required for table '{}'",
            table.name
        )));
    }
    let id_names: Vec<String> = table.id_columns.iter().map(|n| n.to_lowercase()).collect();
    let ids: Vec<_> = row
        .into_iter()
        .filter(|(name, _)| id_names.contains(&name.to_lowercase()))
        .collect();
    if ids.is_empty() {
        return Err(FixtureError::Declaration(format!(
            "the id columns {:?} match no CSV header column of table '{}'",
            table.id_columns, table.name
        )));
    }
    for (name, value) in &ids {
        if value.is_none() {
            return Err(FixtureError::Declaration(format!(
                "id column '{name}' of table '{}' holds a null value",
                table.name
            )));
        }
    }
    let conditions = ids
        .iter()
        .map(|(name, _)| format!("{name} = ?"))
        .join(" AND ");
    let params = ids
        .into_iter()
        .map(|(name, value)| {
            let col_type = csv_resolve_type(table, scanned, &name);
            Parameter { value, col_type }
        })
        .collect();
    Ok(StatementSpec {
        sql: format!("DELETE FROM {} WHERE {conditions}", table.name),
        params,
    })
}

fn csv_parameters(
    table: &CsvTableFixture,
    scanned: &TypesByColumn,
    row: CsvRow,
) -> Vec<Parameter> {
    row.into_iter()
        .map(|(name, value)| {
            let col_type = csv_resolve_type(table, scanned, &name);
            Parameter { value, col_type }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::RowFixture;
    use std::collections::HashMap;

    fn types_for(table: &str, columns: &[(&str, ColumnType)]) -> TypesByTable {
        let mut by_column = HashMap::new();
        for (name, col_type) in columns {
            by_column.insert((*name).to_string(), *col_type);
        }
        let mut by_table = HashMap::new();
        by_table.insert(table.to_string(), by_column);
        by_table
    }

    fn sample_data_set() -> DataSetFixture {
        DataSetFixture::new().table(
            TableFixture::new("accounts")
                .row(RowFixture::new().id_col("id", "1").col("name", "first"))
                .row(RowFixture::new().id_col("id", "2").col("name", "second")),
        )
    }

    #[test]
    fn insert_follows_declaration_order() {
        let types = types_for(
            "accounts",
            &[("id", ColumnType::Integer), ("name", ColumnType::Varchar)],
        );
        let specs = insert_specs(&sample_data_set(), &types).unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].sql, "INSERT INTO accounts (id, name) VALUES (?, ?)");
        assert_eq!(specs[0].params[0].value.as_deref(), Some("1"));
        assert_eq!(specs[0].params[0].col_type, ColumnType::Integer);
        assert_eq!(specs[1].params[0].value.as_deref(), Some("2"));
    }

    #[test]
    fn matched_row_deletes_reverse_rows_and_use_only_ids() {
        let types = types_for(
            "accounts",
            &[("id", ColumnType::Integer), ("name", ColumnType::Varchar)],
        );
        let specs =
            delete_specs(&sample_data_set(), &types, CleanupStrategy::MatchedRows).unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].sql, "DELETE FROM accounts WHERE id = ?");
        assert_eq!(specs[0].params[0].value.as_deref(), Some("2"));
        assert_eq!(specs[1].params[0].value.as_deref(), Some("1"));
    }

    #[test]
    fn all_rows_strategy_emits_one_statement_per_table() {
        let table = (0..5).fold(TableFixture::new("big"), |t, i| {
            t.row(RowFixture::new().id_col("id", i.to_string()))
        });
        let data_set = DataSetFixture::new().table(table);
        let specs = delete_specs(
            &data_set,
            &TypesByTable::new(),
            CleanupStrategy::AllRows,
        )
        .unwrap();

        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].sql, "DELETE FROM big");
        assert!(specs[0].params.is_empty());
    }

    #[test]
    fn missing_id_column_fails_compilation() {
        let data_set = DataSetFixture::new()
            .table(TableFixture::new("t").row(RowFixture::new().col("name", "x")));
        let types = types_for("t", &[("name", ColumnType::Varchar)]);
        let err = delete_specs(&data_set, &types, CleanupStrategy::MatchedRows).unwrap_err();
        assert!(matches!(err, FixtureError::Declaration(_)));
    }

    #[test]
    fn type_resolution_prefers_override_over_scan() {
        let data_set = DataSetFixture::new().table(
            TableFixture::new("t")
                .row(RowFixture::new().id_col("id", "1").col("payload", "YWJj"))
                .type_override("PAYLOAD", ColumnType::Binary),
        );
        let types = types_for(
            "t",
            &[("id", ColumnType::Integer), ("payload", ColumnType::Varchar)],
        );
        let specs = insert_specs(&data_set, &types).unwrap();
        assert_eq!(specs[0].params[1].col_type, ColumnType::Binary);
    }

    #[test]
    fn unknown_column_falls_back_to_default_type() {
        let data_set = DataSetFixture::new()
            .table(TableFixture::new("t").row(RowFixture::new().id_col("extra", "1")));
        let types = types_for("t", &[("id", ColumnType::Integer)]);
        let specs = insert_specs(&data_set, &types).unwrap();
        assert_eq!(specs[0].params[0].col_type, ColumnType::Default);
    }

    #[test]
    fn unresolved_table_is_a_schema_error() {
        let err = insert_specs(&sample_data_set(), &TypesByTable::new()).unwrap_err();
        match err {
            FixtureError::SchemaResolution { table, .. } => assert_eq!(table, "accounts"),
            other => panic!("Expected schema resolution error, got {other:?}"),
        }
    }
}
