//! Live-schema column-type resolution.
//!
//! Before any fixture statement is compiled, every referenced table is
//! introspected through a query that selects all columns but matches no rows.
//! The resulting column descriptors become a per-table map of lower-cased
//! column name to [`ColumnType`], which both the insert and the delete
//! compilation consume so that a later delete addresses the same columns with
//! the same types the insert used.

use std::collections::HashMap;

use log::{debug, info};

use crate::data::ColumnType;
use crate::error::FixtureError;
use crate::execute::Connection;

/// Lower-cased column name to resolved generic type, for one table.
pub type TypesByColumn = HashMap<String, ColumnType>;

/// Table name to its resolved column types. Table names are kept verbatim;
/// only column names are case-normalized.
pub type TypesByTable = HashMap<String, TypesByColumn>;

/// Resolves column types for every table in `tables`.
///
/// Runs with auto-commit disabled so the scan shares the transaction boundary
/// of the statements compiled from it. Any introspection failure rolls the
/// transaction back and aborts before an insert or delete is attempted.
pub fn scan_types(
    conn: &mut dyn Connection,
    tables: &[&str],
) -> Result<TypesByTable, FixtureError> {
    conn.set_auto_commit(false)
        .map_err(|err| FixtureError::execution("disabling auto-commit", err))?;

    let mut by_table = TypesByTable::new();
    for table in tables {
        match scan_table(conn, table) {
            Ok(types) => {
                by_table.insert((*table).to_string(), types);
            }
            Err(err) => {
                if let Err(rollback_err) = conn.rollback() {
                    debug!("rollback after failed scan also failed: {rollback_err:#}");
                } else {
                    info!("rollback");
                }
                return Err(FixtureError::SchemaResolution {
                    table: (*table).to_string(),
                    source: Some(err),
                });
            }
        }
    }
    Ok(by_table)
}

fn scan_table(conn: &mut dyn Connection, table: &str) -> anyhow::Result<TypesByColumn> {
    let sql = format!("SELECT * FROM {table} WHERE 1 = 2");
    let columns = conn.query_metadata(&sql)?;
    let types: TypesByColumn = columns
        .into_iter()
        .map(|(name, col_type)| (name.to_lowercase(), col_type))
        .collect();
    debug!("scanned column types: {table}={types:?}");
    Ok(types)
}
