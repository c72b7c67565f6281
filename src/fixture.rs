//! Fixture declarations: the value objects a test builds to describe the rows
//! it expects to exist.
//!
//! Two declaration styles feed the same compilation pipeline: structured
//! data sets built column by column, and CSV data sets carrying header+rows
//! text blocks. Both are plain immutable data; construction happens through
//! fluent builders and nothing mutates after that.

use crate::data::ColumnType;

/// Pins one column of a table to an explicit generic type, overriding
/// whatever the schema scan reports. Matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct TypeOverride {
    pub column: String,
    pub col_type: ColumnType,
}

/// One declared column value within a row.
#[derive(Debug, Clone)]
pub struct ColumnValue {
    pub name: String,
    pub value: Option<String>,
    /// Id columns identify the row for matched-row deletion.
    pub is_id: bool,
}

/// One row of fixture data, columns in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RowFixture {
    pub columns: Vec<ColumnValue>,
}

impl RowFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn col(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.columns.push(ColumnValue {
            name: name.into(),
            value: Some(value.into()),
            is_id: false,
        });
        self
    }

    pub fn id_col(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.columns.push(ColumnValue {
            name: name.into(),
            value: Some(value.into()),
            is_id: true,
        });
        self
    }

    pub fn null_col(mut self, name: impl Into<String>) -> Self {
        self.columns.push(ColumnValue {
            name: name.into(),
            value: None,
            is_id: false,
        });
        self
    }
}

/// One table's worth of desired rows.
#[derive(Debug, Clone)]
pub struct TableFixture {
    pub name: String,
    pub rows: Vec<RowFixture>,
    pub type_overrides: Vec<TypeOverride>,
}

impl TableFixture {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            type_overrides: Vec::new(),
        }
    }

    pub fn row(mut self, row: RowFixture) -> Self {
        self.rows.push(row);
        self
    }

    pub fn type_override(mut self, column: impl Into<String>, col_type: ColumnType) -> Self {
        self.type_overrides.push(TypeOverride {
            column: column.into(),
            col_type,
        });
        self
    }
}

/// An ordered set of table fixtures. Table order defines insert order;
/// delete order is the exact reverse. Parents must be declared before
/// children.
#[derive(Debug, Clone, Default)]
pub struct DataSetFixture {
    pub tables: Vec<TableFixture>,
}

impl DataSetFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: TableFixture) -> Self {
        self.tables.push(table);
        self
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Default token that parses to a null value in CSV blocks.
pub const DEFAULT_NULL_TOKEN: &str = "[null]";

/// One table declared as a CSV text block: header line plus data rows.
#[derive(Debug, Clone)]
pub struct CsvTableFixture {
    pub name: String,
    pub lines: Vec<String>,
    /// Names of the columns that identify a row for matched-row deletion.
    /// Validated against the parsed header at compile time.
    pub id_columns: Vec<String>,
    pub type_overrides: Vec<TypeOverride>,
}

impl CsvTableFixture {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: Vec::new(),
            id_columns: Vec::new(),
            type_overrides: Vec::new(),
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn id_column(mut self, name: impl Into<String>) -> Self {
        self.id_columns.push(name.into());
        self
    }

    pub fn type_override(mut self, column: impl Into<String>, col_type: ColumnType) -> Self {
        self.type_overrides.push(TypeOverride {
            column: column.into(),
            col_type,
        });
        self
    }

    /// The joined text block handed to the CSV parser.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// An ordered set of CSV table fixtures sharing one null token.
#[derive(Debug, Clone)]
pub struct CsvDataSetFixture {
    pub tables: Vec<CsvTableFixture>,
    pub null_token: String,
}

impl Default for CsvDataSetFixture {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            null_token: DEFAULT_NULL_TOKEN.to_string(),
        }
    }
}

impl CsvDataSetFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: CsvTableFixture) -> Self {
        self.tables.push(table);
        self
    }

    pub fn null_token(mut self, token: impl Into<String>) -> Self {
        self.null_token = token.into();
        self
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

pub(crate) fn override_for(overrides: &[TypeOverride], column: &str) -> Option<ColumnType> {
    let lowered = column.to_lowercase();
    overrides
        .iter()
        .find(|o| o.column.to_lowercase() == lowered)
        .map(|o| o.col_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_preserve_declaration_order() {
        let data_set = DataSetFixture::new()
            .table(
                TableFixture::new("parent").row(
                    RowFixture::new()
                        .id_col("id", "2")
                        .col("name", "class-parent"),
                ),
            )
            .table(TableFixture::new("child"));

        assert_eq!(data_set.table_names(), vec!["parent", "child"]);
        let columns = &data_set.tables[0].rows[0].columns;
        assert_eq!(columns[0].name, "id");
        assert!(columns[0].is_id);
        assert_eq!(columns[1].name, "name");
        assert!(!columns[1].is_id);
    }

    #[test]
    fn override_lookup_is_case_insensitive() {
        let table = TableFixture::new("t").type_override("Payload", ColumnType::Binary);
        assert_eq!(
            override_for(&table.type_overrides, "PAYLOAD"),
            Some(ColumnType::Binary)
        );
        assert_eq!(override_for(&table.type_overrides, "other"), None);
    }
}
