//! Connection seams and transactional statement execution.
//!
//! The crate never talks to a driver directly. [`Connection`] is the narrow
//! surface a database integration implements: zero-row metadata queries,
//! parameterized updates, plain batches, and transaction control. All calls
//! are synchronous and block the calling thread.

use log::{debug, info, warn};

use crate::compile::StatementSpec;
use crate::data::{ColumnType, Value};
use crate::error::FixtureError;

/// Synchronous database connection surface.
///
/// Implementations are expected to leave transaction handling to this crate:
/// the executor disables auto-commit, then commits or rolls back explicitly.
/// A connection is used by one hook invocation on one thread.
pub trait Connection: Send {
    /// Executes a query expected to return zero rows and reports the result
    /// set's column descriptors as (column name, generic type) in column
    /// order.
    fn query_metadata(&mut self, sql: &str) -> anyhow::Result<Vec<(String, ColumnType)>>;

    /// Executes one parameterized update and returns the affected row count.
    fn execute_update(&mut self, sql: &str, params: &[Value]) -> anyhow::Result<u64>;

    /// Executes unparameterized statements as a single batch.
    fn execute_batch(&mut self, statements: &[String]) -> anyhow::Result<()>;

    fn set_auto_commit(&mut self, enabled: bool) -> anyhow::Result<()>;

    fn commit(&mut self) -> anyhow::Result<()>;

    fn rollback(&mut self) -> anyhow::Result<()>;
}

/// Hands out connections; ownership of the underlying pool or data source
/// stays with the caller. Shared by concurrently running tests, so
/// implementations must be thread-safe.
pub trait DataSource: Send + Sync {
    fn connection(&self) -> anyhow::Result<Box<dyn Connection>>;
}

/// Executes compiled statement specs in list order inside one transaction.
///
/// Commits only when every statement succeeded; any failure rolls back first,
/// so partial application is never left visible. A value that fails
/// conversion during binding surfaces as [`FixtureError::Value`], distinct
/// from the driver-rejection [`FixtureError::Execution`].
pub fn execute_all(
    conn: &mut dyn Connection,
    specs: &[StatementSpec],
) -> Result<(), FixtureError> {
    conn.set_auto_commit(false)
        .map_err(|err| FixtureError::execution("disabling auto-commit", err))?;

    for spec in specs {
        let values = match bind_values(spec) {
            Ok(values) => values,
            Err(err) => {
                roll_back(conn);
                return Err(err);
            }
        };
        debug!("executing `{}` with {} parameter(s)", spec.sql, values.len());
        if let Err(err) = conn.execute_update(&spec.sql, &values) {
            roll_back(conn);
            return Err(FixtureError::execution(spec.sql.clone(), err));
        }
    }

    conn.commit()
        .map_err(|err| FixtureError::execution("commit", err))?;
    info!("commit");
    Ok(())
}

/// Executes plain, unparameterized statements (setup/teardown) in one
/// transactional batch.
pub fn execute_plain(
    conn: &mut dyn Connection,
    statements: &[String],
) -> Result<(), FixtureError> {
    conn.set_auto_commit(false)
        .map_err(|err| FixtureError::execution("disabling auto-commit", err))?;

    debug!("executing batch of {} statement(s)", statements.len());
    if let Err(err) = conn.execute_batch(statements) {
        roll_back(conn);
        return Err(FixtureError::execution("statement batch", err));
    }

    conn.commit()
        .map_err(|err| FixtureError::execution("commit", err))?;
    info!("commit");
    Ok(())
}

fn bind_values(spec: &StatementSpec) -> Result<Vec<Value>, FixtureError> {
    spec.params
        .iter()
        .enumerate()
        .map(|(i, param)| match &param.value {
            None => Ok(Value::Null),
            // The default type binds the raw text; interpretation is the
            // driver's problem.
            Some(text) if param.col_type == ColumnType::Default => {
                Ok(Value::Text(text.clone()))
            }
            Some(text) => param.col_type.convert(text).map_err(|err| FixtureError::Value {
                detail: format!("parameter {} of `{}`", i + 1, spec.sql),
                source: err,
            }),
        })
        .collect()
}

fn roll_back(conn: &mut dyn Connection) {
    match conn.rollback() {
        Ok(()) => info!("rollback"),
        Err(err) => warn!("rollback failed: {err:#}"),
    }
}
