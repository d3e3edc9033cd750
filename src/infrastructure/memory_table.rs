use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::domain::errors::DomainError;

use super::table_client::{Row, TableAction, TableClient};

struct MemoryTable {
    key: String,
    rows: Vec<Row>,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, MemoryTable>,
    failures: HashSet<(String, TableAction)>,
    calls: Vec<(String, TableAction)>,
}

/// In-process stand-in for the remote table service.
///
/// Used when no remote credentials are configured and by the tests, which
/// can make individual table actions fail on demand.
#[derive(Default)]
pub struct MemoryTableClient {
    inner: Mutex<Inner>,
}

impl MemoryTableClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, key_column: &str) -> Self {
        self.lock().tables.insert(
            name.to_string(),
            MemoryTable {
                key: key_column.to_string(),
                rows: Vec::new(),
            },
        );
        self
    }

    /// Every later `action` on `table` fails until [`clear_failures`](Self::clear_failures).
    pub fn fail_on(&self, table: &str, action: TableAction) {
        self.lock().failures.insert((table.to_string(), action));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Requests received so far, including the ones made to fail.
    pub fn calls(&self) -> Vec<(String, TableAction)> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, table: &str, action: TableAction, rows: Vec<Row>) -> Result<Vec<Row>, DomainError> {
        let mut inner = self.lock();
        inner.calls.push((table.to_string(), action));
        if inner.failures.contains(&(table.to_string(), action)) {
            return Err(DomainError::Remote(format!(
                "{action} on {table} failed (injected)"
            )));
        }
        let target = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| DomainError::Remote(format!("table {table} does not exist")))?;

        match action {
            TableAction::Find => Ok(target.rows.clone()),
            TableAction::Add => {
                let mut seen: HashSet<String> = target
                    .rows
                    .iter()
                    .filter_map(|r| key_of(r, &target.key).ok())
                    .collect();
                for row in &rows {
                    let key = key_of(row, &target.key)?;
                    if !seen.insert(key.clone()) {
                        return Err(DomainError::Remote(format!(
                            "{table}: duplicate key {key}"
                        )));
                    }
                }
                target.rows.extend(rows.iter().cloned());
                Ok(rows)
            }
            TableAction::Edit => {
                let mut positions = Vec::with_capacity(rows.len());
                for row in &rows {
                    let key = key_of(row, &target.key)?;
                    let position = target
                        .rows
                        .iter()
                        .position(|r| key_of(r, &target.key).ok().as_deref() == Some(key.as_str()))
                        .ok_or_else(|| DomainError::Remote(format!("{table}: no row with key {key}")))?;
                    positions.push(position);
                }
                let mut edited = Vec::with_capacity(rows.len());
                for (position, row) in positions.into_iter().zip(rows) {
                    let stored = &mut target.rows[position];
                    for (column, value) in row {
                        stored.insert(column, value);
                    }
                    edited.push(stored.clone());
                }
                Ok(edited)
            }
            TableAction::Delete => {
                let keys = rows
                    .iter()
                    .map(|r| key_of(r, &target.key))
                    .collect::<Result<HashSet<_>, _>>()?;
                let key_column = target.key.clone();
                let (deleted, kept): (Vec<Row>, Vec<Row>) = target
                    .rows
                    .drain(..)
                    .partition(|r| key_of(r, &key_column).is_ok_and(|k| keys.contains(&k)));
                target.rows = kept;
                Ok(deleted)
            }
        }
    }
}

fn key_of(row: &Row, key_column: &str) -> Result<String, DomainError> {
    match row.get(key_column) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(DomainError::Remote(format!(
            "row is missing key column {key_column}"
        ))),
    }
}

impl TableClient for MemoryTableClient {
    async fn request(
        &self,
        table: &str,
        action: TableAction,
        rows: Vec<Row>,
    ) -> Result<Vec<Row>, DomainError> {
        self.handle(table, action, rows)
    }
}
