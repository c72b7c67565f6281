//! Before/after test orchestration.
//!
//! This module owns the [`FixtureLifecycle`] coordinator that a test
//! harness's hooks call around each test body, the [`CleanupPhase`] policy
//! gating when deletes run, and the [`FixtureBinding`] that pairs a stable
//! test identifier with the declarations in effect for that test.
//!
//! ## Responsibilities
//!
//! - run optional setup statements before fixture preparation
//! - resolve column types once per test and reuse them for insert and delete
//! - delete-then-insert before the test body, delete after it, per phase
//! - carry the resolved types from the before hook to the after hook through
//!   an explicit per-test store
//! - run optional teardown statements after cleanup

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use log::{debug, info};

use crate::compile::{
    CleanupStrategy, csv_delete_specs, csv_insert_specs, delete_specs, insert_specs,
};
use crate::error::FixtureError;
use crate::execute::{DataSource, execute_all, execute_plain};
use crate::fixture::{CsvDataSetFixture, DataSetFixture};
use crate::schema::{TypesByTable, scan_types};

/// When cleanup runs relative to the test body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CleanupPhase {
    /// Delete declared data only before each test.
    Before,
    /// Delete declared data only after each test.
    After,
    /// Delete declared data before and after each test.
    #[default]
    BeforeAndAfter,
}

impl CleanupPhase {
    pub fn cleans_before(&self) -> bool {
        matches!(self, CleanupPhase::Before | CleanupPhase::BeforeAndAfter)
    }

    pub fn cleans_after(&self) -> bool {
        matches!(self, CleanupPhase::After | CleanupPhase::BeforeAndAfter)
    }
}

/// The declarations attached at one level (test method or test class).
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    pub data_set: Option<DataSetFixture>,
    pub csv_data_set: Option<CsvDataSetFixture>,
}

/// The declarations in effect for one test invocation, keyed by a stable
/// test identifier.
#[derive(Debug, Clone)]
pub struct FixtureBinding {
    pub test_id: String,
    pub data_set: Option<DataSetFixture>,
    pub csv_data_set: Option<CsvDataSetFixture>,
}

impl FixtureBinding {
    pub fn new(test_id: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            data_set: None,
            csv_data_set: None,
        }
    }

    pub fn data_set(mut self, data_set: DataSetFixture) -> Self {
        self.data_set = Some(data_set);
        self
    }

    pub fn csv_data_set(mut self, data_set: CsvDataSetFixture) -> Self {
        self.csv_data_set = Some(data_set);
        self
    }

    /// Applies declaration precedence: per fixture kind, a declaration on the
    /// test method overrides one on the enclosing class; neither present
    /// leaves that kind a no-op.
    pub fn resolve(test_id: impl Into<String>, method: Declarations, class: Declarations) -> Self {
        Self {
            test_id: test_id.into(),
            data_set: method.data_set.or(class.data_set),
            csv_data_set: method.csv_data_set.or(class.csv_data_set),
        }
    }

    fn is_empty(&self) -> bool {
        self.data_set.is_none() && self.csv_data_set.is_none()
    }
}

/// Coordinates fixture preparation and cleanup around each test.
///
/// One instance is shared by every test of a suite; each hook invocation
/// acquires its own connection and releases it before returning. The store
/// of resolved column types is isolated per test identifier.
pub struct FixtureLifecycle {
    data_source: Box<dyn DataSource>,
    cleanup_phase: CleanupPhase,
    cleanup_strategy: CleanupStrategy,
    setup_statements: Vec<String>,
    teardown_statements: Vec<String>,
    store: Mutex<HashMap<String, TypesByTable>>,
}

impl FixtureLifecycle {
    pub fn new(data_source: Box<dyn DataSource>) -> Self {
        Self::builder(data_source).build()
    }

    pub fn builder(data_source: Box<dyn DataSource>) -> FixtureLifecycleBuilder {
        FixtureLifecycleBuilder {
            data_source,
            cleanup_phase: CleanupPhase::default(),
            cleanup_strategy: CleanupStrategy::default(),
            setup_statements: Vec::new(),
            teardown_statements: Vec::new(),
        }
    }

    /// The before-test hook: setup statements, column-type resolution,
    /// delete (when the phase cleans before) and insert, then storing the
    /// resolved types for the after hook.
    ///
    /// Does nothing when the binding carries no declaration of either kind.
    pub fn before_test(&self, binding: &FixtureBinding) -> Result<(), FixtureError> {
        if binding.is_empty() {
            debug!("no fixture declaration for test '{}'", binding.test_id);
            return Ok(());
        }
        info!("preparing fixture data before test '{}'", binding.test_id);
        let mut conn = self.connect()?;
        let conn = conn.as_mut();

        if !self.setup_statements.is_empty() {
            info!("executing setup statements");
            execute_plain(conn, &self.setup_statements)?;
        }

        let structured_types = match &binding.data_set {
            Some(data_set) => Some(scan_types(conn, &data_set.table_names())?),
            None => None,
        };
        let csv_types = match &binding.csv_data_set {
            Some(data_set) => Some(scan_types(conn, &data_set.table_names())?),
            None => None,
        };

        if self.cleanup_phase.cleans_before() {
            // Deletes run in the exact reverse of insert order across the
            // two declaration kinds: CSV data first, then structured.
            if let (Some(data_set), Some(types)) = (&binding.csv_data_set, &csv_types) {
                execute_all(conn, &csv_delete_specs(data_set, types, self.cleanup_strategy)?)?;
            }
            if let (Some(data_set), Some(types)) = (&binding.data_set, &structured_types) {
                execute_all(conn, &delete_specs(data_set, types, self.cleanup_strategy)?)?;
            }
        }

        if let (Some(data_set), Some(types)) = (&binding.data_set, &structured_types) {
            execute_all(conn, &insert_specs(data_set, types)?)?;
        }
        if let (Some(data_set), Some(types)) = (&binding.csv_data_set, &csv_types) {
            execute_all(conn, &csv_insert_specs(data_set, types)?)?;
        }

        let mut merged = structured_types.unwrap_or_default();
        if let Some(csv_types) = csv_types {
            // CSV entries win on table-name collision.
            merged.extend(csv_types);
        }
        if !merged.is_empty() {
            self.store_types(&binding.test_id, merged);
        }
        Ok(())
    }

    /// The after-test hook: delete (when the phase cleans after) using the
    /// column types stored by the before hook, then teardown statements.
    ///
    /// Does nothing when the before hook stored nothing for this test.
    pub fn after_test(&self, binding: &FixtureBinding) -> Result<(), FixtureError> {
        let Some(types) = self.remove_types(&binding.test_id) else {
            debug!("no stored column types for test '{}'", binding.test_id);
            return Ok(());
        };
        info!("cleaning up fixture data after test '{}'", binding.test_id);
        let mut conn = self.connect()?;
        let conn = conn.as_mut();

        if self.cleanup_phase.cleans_after() {
            if let Some(data_set) = &binding.csv_data_set {
                execute_all(conn, &csv_delete_specs(data_set, &types, self.cleanup_strategy)?)?;
            }
            if let Some(data_set) = &binding.data_set {
                execute_all(conn, &delete_specs(data_set, &types, self.cleanup_strategy)?)?;
            }
        }

        if !self.teardown_statements.is_empty() {
            info!("executing teardown statements");
            execute_plain(conn, &self.teardown_statements)?;
        }
        Ok(())
    }

    fn connect(&self) -> Result<Box<dyn crate::execute::Connection>, FixtureError> {
        self.data_source
            .connection()
            .map_err(|err| FixtureError::execution("acquiring a connection", err))
    }

    fn store_types(&self, test_id: &str, types: TypesByTable) {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.insert(test_id.to_string(), types);
    }

    fn remove_types(&self, test_id: &str) -> Option<TypesByTable> {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.remove(test_id)
    }
}

/// Configures and builds a [`FixtureLifecycle`].
pub struct FixtureLifecycleBuilder {
    data_source: Box<dyn DataSource>,
    cleanup_phase: CleanupPhase,
    cleanup_strategy: CleanupStrategy,
    setup_statements: Vec<String>,
    teardown_statements: Vec<String>,
}

impl FixtureLifecycleBuilder {
    pub fn cleanup_phase(mut self, phase: CleanupPhase) -> Self {
        self.cleanup_phase = phase;
        self
    }

    pub fn cleanup_strategy(mut self, strategy: CleanupStrategy) -> Self {
        self.cleanup_strategy = strategy;
        self
    }

    /// Statements run once per before hook, ahead of fixture preparation.
    pub fn setup_statements<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.setup_statements = statements.into_iter().map(Into::into).collect();
        self
    }

    /// Statements run once per after hook, after fixture cleanup.
    pub fn teardown_statements<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.teardown_statements = statements.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> FixtureLifecycle {
        FixtureLifecycle {
            data_source: self.data_source,
            cleanup_phase: self.cleanup_phase,
            cleanup_strategy: self.cleanup_strategy,
            setup_statements: self.setup_statements,
            teardown_statements: self.teardown_statements,
            store: Mutex::new(HashMap::new()),
        }
    }
}
