//! Declarative test-fixture lifecycle management for relational-database-
//! backed tests.
//!
//! Tests declare the rows they expect (structured builders or CSV text
//! blocks); this crate compiles the declarations into ordered parameterized
//! INSERT and DELETE statements, executes them transactionally before the
//! test body, and reverses the operation symmetrically afterwards — so
//! integration tests need not hand-write setup and teardown SQL.

pub mod compile;
pub mod csv;
pub mod data;
pub mod error;
pub mod execute;
pub mod fixture;
pub mod lifecycle;
pub mod schema;

pub use compile::{CleanupStrategy, Parameter, StatementSpec};
pub use data::{ColumnType, Value};
pub use error::FixtureError;
pub use execute::{Connection, DataSource};
pub use fixture::{
    CsvDataSetFixture, CsvTableFixture, DEFAULT_NULL_TOKEN, DataSetFixture, RowFixture,
    TableFixture, TypeOverride,
};
pub use lifecycle::{CleanupPhase, Declarations, FixtureBinding, FixtureLifecycle};
pub use schema::{TypesByColumn, TypesByTable};
