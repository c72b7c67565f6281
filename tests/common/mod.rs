#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::bail;
use db_fixture::{ColumnType, Connection, DataSource, Value};

/// Initializes test logging once; safe to call from every test.
pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Observable state shared between a [`FakeDataSource`], every connection it
/// hands out, and the test making assertions.
#[derive(Clone, Default)]
pub struct SharedState(Arc<Mutex<StateInner>>);

#[derive(Default)]
struct StateInner {
    calls: Vec<String>,
    committed: Vec<String>,
    scan_counts: HashMap<String, usize>,
}

impl SharedState {
    fn push(&self, call: impl Into<String>) {
        self.lock().calls.push(call.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StateInner> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Only the executed statements, in order.
    pub fn executed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| call.strip_prefix("execute: ").map(str::to_string))
            .collect()
    }

    /// What a fresh read on a separate connection would see: statements whose
    /// transaction committed.
    pub fn committed(&self) -> Vec<String> {
        self.lock().committed.clone()
    }
}

/// Scripted stand-in for a database.
///
/// Serves canned column scans per table (repeated registrations for the same
/// table are served in order, the last one repeating), records every call,
/// and keeps a committed/pending split so tests can observe transactional
/// visibility. `fail_on` makes `execute_update` reject any statement whose
/// rendered form contains the fragment.
pub struct FakeDataSource {
    state: SharedState,
    columns: HashMap<String, Vec<Vec<(String, ColumnType)>>>,
    fail_on: Option<String>,
}

impl FakeDataSource {
    pub fn new() -> Self {
        Self {
            state: SharedState::default(),
            columns: HashMap::new(),
            fail_on: None,
        }
    }

    pub fn with_table(mut self, table: &str, columns: &[(&str, ColumnType)]) -> Self {
        let scan = columns
            .iter()
            .map(|(name, col_type)| ((*name).to_string(), *col_type))
            .collect();
        self.columns.entry(table.to_string()).or_default().push(scan);
        self
    }

    pub fn fail_on(mut self, fragment: &str) -> Self {
        self.fail_on = Some(fragment.to_string());
        self
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }
}

impl DataSource for FakeDataSource {
    fn connection(&self) -> anyhow::Result<Box<dyn Connection>> {
        self.state.push("connection");
        Ok(Box::new(FakeConnection {
            state: self.state.clone(),
            columns: self.columns.clone(),
            fail_on: self.fail_on.clone(),
            pending: Vec::new(),
        }))
    }
}

struct FakeConnection {
    state: SharedState,
    columns: HashMap<String, Vec<Vec<(String, ColumnType)>>>,
    fail_on: Option<String>,
    pending: Vec<String>,
}

impl Connection for FakeConnection {
    fn query_metadata(&mut self, sql: &str) -> anyhow::Result<Vec<(String, ColumnType)>> {
        self.state.push(format!("metadata: {sql}"));
        let table = sql
            .strip_prefix("SELECT * FROM ")
            .and_then(|rest| rest.strip_suffix(" WHERE 1 = 2"))
            .unwrap_or(sql);
        let Some(scans) = self.columns.get(table) else {
            bail!("table '{table}' is not stored");
        };
        let index = {
            let mut state = self.state.lock();
            let count = state.scan_counts.entry(table.to_string()).or_insert(0);
            let index = (*count).min(scans.len() - 1);
            *count += 1;
            index
        };
        Ok(scans[index].clone())
    }

    fn execute_update(&mut self, sql: &str, params: &[Value]) -> anyhow::Result<u64> {
        let rendered = render(sql, params);
        if let Some(fragment) = &self.fail_on {
            if rendered.contains(fragment.as_str()) {
                bail!("scripted failure for `{rendered}`");
            }
        }
        self.state.push(format!("execute: {rendered}"));
        self.pending.push(rendered);
        Ok(1)
    }

    fn execute_batch(&mut self, statements: &[String]) -> anyhow::Result<()> {
        for statement in statements {
            self.state.push(format!("batch: {statement}"));
            self.pending.push(statement.clone());
        }
        Ok(())
    }

    fn set_auto_commit(&mut self, enabled: bool) -> anyhow::Result<()> {
        self.state.push(format!("auto_commit({enabled})"));
        Ok(())
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        self.state.push("commit");
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut self.pending);
        state.committed.extend(pending);
        Ok(())
    }

    fn rollback(&mut self) -> anyhow::Result<()> {
        self.state.push("rollback");
        self.pending.clear();
        Ok(())
    }
}

fn render(sql: &str, params: &[Value]) -> String {
    if params.is_empty() {
        sql.to_string()
    } else {
        let rendered: Vec<String> = params.iter().map(Value::to_string).collect();
        format!("{sql} [{}]", rendered.join(", "))
    }
}
